//! sitekeep CLI - Backup and restore for multi-tenant sites
//!
//! This is the main entry point for the sitekeep command-line interface.

mod cli;
mod commands;
mod output;
mod version;

use anyhow::Result;
use clap::Parser;
use sitekeep_backup::{BackupError, ErrorKind};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

fn main() -> ExitCode {
    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Version(args) => commands::version::run(args),
        Commands::Backup(args) => commands::backup::run(args, &cli.site, quiet),
        Commands::Restore(args) => commands::restore::run(args, &cli.site, quiet),
        Commands::PartialRestore(args) => commands::restore::run_partial(args, &cli.site, quiet),
        Commands::SetConfig(args) => commands::config::run(args, &cli.site),
        Commands::ListBackups(args) => commands::backups::run(args, &cli.site),
        Commands::StartRecording => commands::recording::start(&cli.site),
        Commands::StopRecording => commands::recording::stop(&cli.site),
        Commands::RecordingStatus => commands::recording::status(&cli.site),
    }
}

/// Maps the error behind a failure to the process exit code.
///
/// 2 policy, 3 filesystem or unreadable dump, 4 database engine, 5 schema conflict, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<BackupError>() {
            return match e.kind() {
                ErrorKind::Policy => 2,
                ErrorKind::Io => 3,
                ErrorKind::Engine => 4,
                ErrorKind::SchemaConflict => 5,
            };
        }
        if let Some(e) = cause.downcast_ref::<sitekeep_core::Error>() {
            return match e {
                sitekeep_core::Error::InvalidConfig { .. }
                | sitekeep_core::Error::JsonParse(_)
                | sitekeep_core::Error::InvalidTableName { .. } => 2,
                sitekeep_core::Error::Io(_) => 3,
                _ => 1,
            };
        }
    }
    1
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Warnings by default; -v shows stage progress
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

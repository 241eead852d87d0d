//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

// Re-export command types for convenience
pub use crate::commands::backup::BackupArgs;
pub use crate::commands::backups::ListBackupsArgs;
pub use crate::commands::config::SetConfigArgs;
pub use crate::commands::restore::{PartialRestoreArgs, RestoreArgs};

/// sitekeep - Backup and restore for multi-tenant sites
#[derive(Parser, Debug)]
#[command(name = "sitekeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub site: SiteArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which site a command operates on.
#[derive(Args, Debug, Clone)]
pub struct SiteArgs {
    /// Directory holding every site of the bench
    #[arg(long, global = true, env = "SITEKEEP_SITES_DIR", default_value = "sites")]
    pub sites_dir: Utf8PathBuf,

    /// Site to operate on
    #[arg(long, global = true, env = "SITEKEEP_SITE")]
    pub site: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Back up the site's database and, optionally, its files
    Backup(BackupArgs),

    /// Restore the site's database from a dump or bundle
    Restore(RestoreArgs),

    /// Restore only the tables found in a dump, leaving every other table untouched
    PartialRestore(PartialRestoreArgs),

    /// Set a value in the site's site_config.json
    SetConfig(SetConfigArgs),

    /// Show the latest (or every) backup of the site
    ListBackups(ListBackupsArgs),

    /// Turn the request recorder on
    StartRecording,

    /// Turn the request recorder off
    StopRecording,

    /// Show whether the request recorder is on
    RecordingStatus,
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

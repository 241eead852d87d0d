//! Restore and partial-restore commands
//!
//! Connects the CLI restore UI to the sitekeep-backup restore library.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Args;
use dialoguer::Confirm;
use sitekeep_backup::{run_restore, RestoreMode, RestoreOptions, RestoreReport};
use sitekeep_core::Site;

use crate::cli::SiteArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Database dump (.sql or .sql.gz) or bundle (.tgz)
    pub path: Utf8PathBuf,

    /// Public files archive to extract into the site
    #[arg(long)]
    pub with_public_files: Option<Utf8PathBuf>,

    /// Private files archive to extract into the site
    #[arg(long)]
    pub with_private_files: Option<Utf8PathBuf>,

    /// Also extract the file archives stored in a bundle
    #[arg(long)]
    pub with_files: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct PartialRestoreArgs {
    /// Database dump (.sql or .sql.gz) or bundle (.tgz)
    pub path: Utf8PathBuf,
}

pub fn run(args: RestoreArgs, site_args: &SiteArgs, quiet: bool) -> Result<()> {
    let site = super::open_site(site_args)?;

    if !args.yes {
        output::warning(&format!(
            "Every table of {} not found in {} will be dropped",
            site.name(),
            args.path
        ));
        let proceed = Confirm::new()
            .with_prompt("Proceed with restore?")
            .default(false)
            .interact()
            .context("Confirmation failed; pass --yes to restore without a prompt")?;
        if !proceed {
            output::info("Restore cancelled");
            return Ok(());
        }
    }

    let options = RestoreOptions {
        source: args.path,
        mode: RestoreMode::Full,
        public_files: args.with_public_files,
        private_files: args.with_private_files,
        with_bundled_files: args.with_files,
    };
    restore(&site, &options, quiet)
}

pub fn run_partial(args: PartialRestoreArgs, site_args: &SiteArgs, quiet: bool) -> Result<()> {
    let site = super::open_site(site_args)?;
    restore(&site, &RestoreOptions::new(args.path, RestoreMode::Partial), quiet)
}

fn restore(site: &Site, options: &RestoreOptions, quiet: bool) -> Result<()> {
    let spinner = output::spinner(
        &format!("Restoring {} from {}...", site.name(), options.source),
        quiet,
    );
    let result = run_restore(site, options);
    spinner.finish_and_clear();
    let report = result.with_context(|| {
        format!(
            "{} restore of {} from {} failed",
            options.mode, site.name(), options.source
        )
    })?;

    if !quiet {
        print_report(&report);
    }
    output::success(&format!(
        "Restored {} tables into {} ({} restore)",
        report.outcome.restored.len(),
        site.name(),
        report.outcome.mode
    ));
    Ok(())
}

fn print_report(report: &RestoreReport) {
    if let Some(manifest) = &report.manifest {
        output::kv("Bundle site", &manifest.site);
        output::kv("Created", &manifest.created_at.to_rfc3339());
    }
    if !report.outcome.dropped.is_empty() {
        let dropped: Vec<String> = report.outcome.dropped.iter().map(|t| t.to_string()).collect();
        output::kv("Dropped", &dropped.join(", "));
    }
    if report.files_extracted > 0 {
        output::kv("Files extracted", &report.files_extracted.to_string());
    }
    output::kv("Duration", &format!("{:.2?}", report.outcome.duration));
}

//! Backup command

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Args;
use sitekeep_backup::{
    human_bytes, run_backup, ArtifactKind, BackupOptions, BackupReport, FilterRequest,
    PathOverrides,
};
use sitekeep_core::TableName;

use crate::cli::SiteArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Also archive public and private files
    #[arg(long)]
    pub with_files: bool,

    /// Directory for every backup artifact
    #[arg(long)]
    pub backup_path: Option<Utf8PathBuf>,

    /// Path of the database dump
    #[arg(long)]
    pub backup_path_db: Option<Utf8PathBuf>,

    /// Path of the public files archive
    #[arg(long)]
    pub backup_path_files: Option<Utf8PathBuf>,

    /// Path of the private files archive
    #[arg(long)]
    pub backup_path_private_files: Option<Utf8PathBuf>,

    /// Path of the site config snapshot
    #[arg(long)]
    pub backup_path_conf: Option<Utf8PathBuf>,

    /// Also write a single .tgz bundle of every artifact
    #[arg(long)]
    pub compress: bool,

    /// Comma separated doctypes to back up (overrides backup.excludes for those)
    #[arg(long, visible_alias = "only", value_name = "DOCTYPES")]
    pub include: Option<String>,

    /// Comma separated doctypes to leave out (overrides backup.includes for those)
    #[arg(long, value_name = "DOCTYPES")]
    pub exclude: Option<String>,

    /// Ignore backup.includes and backup.excludes from site config
    #[arg(long)]
    pub ignore_backup_conf: bool,
}

impl BackupArgs {
    fn options(&self) -> Result<BackupOptions> {
        let parse = |csv: &Option<String>| -> Result<Vec<TableName>> {
            match csv {
                Some(csv) => TableName::parse_list(csv).context("Invalid table list"),
                None => Ok(Vec::new()),
            }
        };

        Ok(BackupOptions {
            filters: FilterRequest {
                include: parse(&self.include)?,
                exclude: parse(&self.exclude)?,
                ignore_config: self.ignore_backup_conf,
            },
            overrides: PathOverrides {
                backup_dir: self.backup_path.clone(),
                database: self.backup_path_db.clone(),
                public_files: self.backup_path_files.clone(),
                private_files: self.backup_path_private_files.clone(),
                config: self.backup_path_conf.clone(),
            },
            with_files: self.with_files,
            compress: self.compress,
        })
    }
}

pub fn run(args: BackupArgs, site_args: &SiteArgs, quiet: bool) -> Result<()> {
    let site = super::open_site(site_args)?;
    let options = args.options()?;

    let spinner = output::spinner(&format!("Backing up {}...", site.name()), quiet);
    let result = run_backup(&site, &options);
    spinner.finish_and_clear();
    let report = result.with_context(|| format!("Backup of {} failed", site.name()))?;

    if !quiet {
        print_artifacts(&report);
    }
    output::success(&report.outcome.summary());
    Ok(())
}

fn print_artifacts(report: &BackupReport) {
    let outcome = &report.outcome;
    output::header(&format!("Backup Summary for {} at {}", outcome.site, outcome.paths.stem));

    let kinds = [
        ArtifactKind::Config,
        ArtifactKind::Database,
        ArtifactKind::PublicFiles,
        ArtifactKind::PrivateFiles,
    ];
    for kind in kinds {
        if let Some(artifact) = outcome.artifact(kind) {
            output::kv(
                kind.label(),
                &format!("{} {}", artifact.path, human_bytes(artifact.size_bytes)),
            );
        }
    }
    if let (Some(bundle), Some(manifest)) = (&outcome.paths.bundle, &report.manifest) {
        output::kv(
            "Bundle",
            &format!("{} ({} artifacts)", bundle, manifest.artifacts.len()),
        );
    }
    if report.policy.is_partial() {
        output::kv("Tables", &format!("{} (partial)", outcome.tables.len()));
    }
    println!();
}

//! list-backups command

use anyhow::{Context, Result};
use clap::Args;
use sitekeep_backup::{BackupRecord, BackupRegistry, DirectoryListing};
use tabled::{settings::Style, Table, Tabled};

use crate::cli::SiteArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ListBackupsArgs {
    /// Only partial backups
    #[arg(long)]
    pub partial: bool,

    /// Every backup instead of only the latest
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "taken at")]
    timestamp: String,
    #[tabled(rename = "type")]
    kind: &'static str,
    database: String,
    files: &'static str,
    bundle: &'static str,
}

impl From<&BackupRecord> for BackupRow {
    fn from(record: &BackupRecord) -> Self {
        let yes_no = |present: bool| if present { "yes" } else { "no" };
        Self {
            timestamp: record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            kind: if record.is_partial { "partial" } else { "full" },
            database: record
                .database
                .file_name()
                .unwrap_or(record.database.as_str())
                .to_string(),
            files: yes_no(record.public_files.is_some() || record.private_files.is_some()),
            bundle: yes_no(record.bundle.is_some()),
        }
    }
}

pub fn run(args: ListBackupsArgs, site_args: &SiteArgs) -> Result<()> {
    let site = super::open_site(site_args)?;
    let registry =
        BackupRegistry::new(DirectoryListing::new(site.backup_dir())).for_site(site.slug());

    let records: Vec<BackupRecord> = if args.all {
        registry
            .all()
            .context("Failed to list backups")?
            .into_iter()
            .filter(|r| !args.partial || r.is_partial)
            .collect()
    } else if args.partial {
        registry.latest_partial()?.into_iter().collect()
    } else {
        registry.latest_full()?.into_iter().collect()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        output::info(&format!("No backups found in {}", registry.dir()));
        return Ok(());
    }

    let rows: Vec<BackupRow> = records.iter().map(BackupRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
    Ok(())
}

//! Backup registry
//!
//! Finds backups by looking at file names only. A backup exists once its
//! database dump (`<stem>-database.sql.gz`) is in place; the other artifacts
//! sharing its stem are attached to it when present. In-progress `.part`
//! files never match.

use crate::error::{BackupError, Result};
use crate::paths::{
    BUNDLE_SUFFIX, CONFIG_SUFFIX, PRIVATE_FILES_SUFFIX, PUBLIC_FILES_SUFFIX, TIMESTAMP_FORMAT,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::sync::LazyLock;
use tracing::debug;

static DATABASE_DUMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((\d{8}_\d{6})-(.+?)(-partial)?)-database\.sql\.gz$")
        .expect("database dump name regex is valid")
});

/// Source of backup file names.
pub trait BackupListing {
    /// Directory the names are relative to.
    fn dir(&self) -> &Utf8Path;

    /// File names in the directory. A missing directory lists nothing.
    fn file_names(&self) -> Result<Vec<String>>;
}

/// Lists a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    dir: Utf8PathBuf,
}

impl DirectoryListing {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BackupListing for DirectoryListing {
    fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn file_names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Backup directory {} does not exist", self.dir);
                return Ok(Vec::new());
            }
            Err(e) => return Err(BackupError::io(&self.dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::io(&self.dir, e))?;
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// One complete backup found in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub timestamp: NaiveDateTime,
    pub site_slug: String,
    pub is_partial: bool,
    pub database: Utf8PathBuf,
    pub public_files: Option<Utf8PathBuf>,
    pub private_files: Option<Utf8PathBuf>,
    pub config: Option<Utf8PathBuf>,
    pub bundle: Option<Utf8PathBuf>,
}

/// Parses backup records out of file names, newest first.
pub fn parse_records(dir: &Utf8Path, names: &[String]) -> Vec<BackupRecord> {
    let present: HashSet<&str> = names.iter().map(String::as_str).collect();
    let sibling = |stem: &str, suffix: &str| {
        let name = format!("{}-{}", stem, suffix);
        present.contains(name.as_str()).then(|| dir.join(name))
    };

    let mut records: Vec<BackupRecord> = names
        .iter()
        .filter_map(|name| {
            let caps = DATABASE_DUMP.captures(name)?;
            let stem = caps.get(1)?.as_str();
            let timestamp = NaiveDateTime::parse_from_str(caps.get(2)?.as_str(), TIMESTAMP_FORMAT).ok()?;
            Some(BackupRecord {
                timestamp,
                site_slug: caps.get(3)?.as_str().to_string(),
                is_partial: caps.get(4).is_some(),
                database: dir.join(name),
                public_files: sibling(stem, PUBLIC_FILES_SUFFIX),
                private_files: sibling(stem, PRIVATE_FILES_SUFFIX),
                config: sibling(stem, CONFIG_SUFFIX),
                bundle: sibling(stem, BUNDLE_SUFFIX),
            })
        })
        .collect();

    records.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.database.cmp(&a.database))
    });
    records
}

/// Read-through index of the backups in one listing.
pub struct BackupRegistry<L: BackupListing> {
    listing: L,
    site_slug: Option<String>,
}

impl<L: BackupListing> BackupRegistry<L> {
    pub fn new(listing: L) -> Self {
        Self {
            listing,
            site_slug: None,
        }
    }

    /// Only report backups of one site.
    pub fn for_site(mut self, site_slug: impl Into<String>) -> Self {
        self.site_slug = Some(site_slug.into());
        self
    }

    pub fn dir(&self) -> &Utf8Path {
        self.listing.dir()
    }

    /// Every backup, newest first.
    pub fn all(&self) -> Result<Vec<BackupRecord>> {
        let names = self.listing.file_names()?;
        let mut records = parse_records(self.listing.dir(), &names);
        if let Some(slug) = &self.site_slug {
            records.retain(|r| &r.site_slug == slug);
        }
        Ok(records)
    }

    /// Most recent backup covering every table.
    pub fn latest_full(&self) -> Result<Option<BackupRecord>> {
        Ok(self.all()?.into_iter().find(|r| !r.is_partial))
    }

    /// Most recent backup covering a subset of tables.
    pub fn latest_partial(&self) -> Result<Option<BackupRecord>> {
        Ok(self.all()?.into_iter().find(|r| r.is_partial))
    }
}

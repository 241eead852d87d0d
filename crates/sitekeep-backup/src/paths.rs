//! Backup artifact locations.
//!
//! Every artifact of one backup shares a stem,
//! `<YYYYMMDD_HHMMSS>-<site_slug>[-partial]`, followed by an artifact suffix.
//! Artifacts land in the site's `private/backups` directory unless overridden.

use crate::error::{BackupError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use serde::Serialize;
use sitekeep_core::Site;

/// Timestamp format used in backup file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const DATABASE_SUFFIX: &str = "database.sql.gz";
pub const PUBLIC_FILES_SUFFIX: &str = "files.tar";
pub const PRIVATE_FILES_SUFFIX: &str = "private-files.tar";
pub const CONFIG_SUFFIX: &str = "site_config_backup.json";
pub const BUNDLE_SUFFIX: &str = "backup.tgz";

/// Marker inserted into the stem of partial backups.
pub const PARTIAL_MARKER: &str = "partial";

/// Extension of artifacts that are still being written.
pub const PART_EXTENSION: &str = "part";

/// Per-artifact destination overrides.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    /// Replaces the default backup directory for every artifact
    pub backup_dir: Option<Utf8PathBuf>,
    pub database: Option<Utf8PathBuf>,
    pub public_files: Option<Utf8PathBuf>,
    pub private_files: Option<Utf8PathBuf>,
    pub config: Option<Utf8PathBuf>,
}

/// Destinations of every artifact produced by one backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupPaths {
    pub backup_dir: Utf8PathBuf,
    pub stem: String,
    pub database: Utf8PathBuf,
    pub public_files: Option<Utf8PathBuf>,
    pub private_files: Option<Utf8PathBuf>,
    pub config: Utf8PathBuf,
    pub bundle: Option<Utf8PathBuf>,
    pub is_partial: bool,
    pub with_files: bool,
}

impl BackupPaths {
    /// Artifacts written by the dump engine, in write order.
    pub fn artifacts(&self) -> Vec<&Utf8Path> {
        let mut artifacts = Vec::with_capacity(4);
        if let Some(public) = &self.public_files {
            artifacts.push(public.as_path());
        }
        if let Some(private) = &self.private_files {
            artifacts.push(private.as_path());
        }
        artifacts.push(self.config.as_path());
        artifacts.push(self.database.as_path());
        artifacts
    }

    /// Creates the parent directory of every destination.
    pub fn create_parent_dirs(&self) -> Result<()> {
        let bundle = self.bundle.as_deref();
        for path in self.artifacts().into_iter().chain(bundle) {
            if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| BackupError::io(parent, e))?;
            }
        }
        Ok(())
    }
}

/// Path of the in-progress file for an artifact.
pub fn part_path(path: &Utf8Path) -> Utf8PathBuf {
    match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.{}", name, PART_EXTENSION)),
        None => Utf8PathBuf::from(format!("{}.{}", path, PART_EXTENSION)),
    }
}

/// File name stem shared by all artifacts of one backup.
pub fn backup_stem(timestamp: &NaiveDateTime, site_slug: &str, is_partial: bool) -> String {
    let mut stem = format!("{}-{}", timestamp.format(TIMESTAMP_FORMAT), site_slug);
    if is_partial {
        stem.push('-');
        stem.push_str(PARTIAL_MARKER);
    }
    stem
}

/// Computes artifact destinations for a site.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    site_slug: String,
    default_dir: Utf8PathBuf,
    overrides: PathOverrides,
}

impl PathPlanner {
    pub fn new(site: &Site, overrides: PathOverrides) -> Self {
        Self {
            site_slug: site.slug(),
            default_dir: site.backup_dir(),
            overrides,
        }
    }

    /// Directory holding default-named artifacts and the bundle.
    pub fn backup_dir(&self) -> &Utf8Path {
        self.overrides
            .backup_dir
            .as_deref()
            .unwrap_or(&self.default_dir)
    }

    /// Plans the paths of one backup. Does not touch the filesystem.
    pub fn plan(
        &self,
        timestamp: &NaiveDateTime,
        is_partial: bool,
        with_files: bool,
        compress: bool,
    ) -> BackupPaths {
        let dir = self.backup_dir().to_owned();
        let stem = backup_stem(timestamp, &self.site_slug, is_partial);
        let named = |suffix: &str| dir.join(format!("{}-{}", stem, suffix));
        let pick = |over: &Option<Utf8PathBuf>, suffix: &str| {
            over.clone().unwrap_or_else(|| named(suffix))
        };

        BackupPaths {
            database: pick(&self.overrides.database, DATABASE_SUFFIX),
            public_files: with_files.then(|| pick(&self.overrides.public_files, PUBLIC_FILES_SUFFIX)),
            private_files: with_files
                .then(|| pick(&self.overrides.private_files, PRIVATE_FILES_SUFFIX)),
            config: pick(&self.overrides.config, CONFIG_SUFFIX),
            bundle: compress.then(|| named(BUNDLE_SUFFIX)),
            backup_dir: dir,
            stem,
            is_partial,
            with_files,
        }
    }
}

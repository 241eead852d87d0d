//! Backup and restore jobs for one site.
//!
//! A job wires the pieces together: site configuration, filter resolution,
//! path planning, the dump engine and the bundler for backups; bundle
//! unpacking, the restore engine and file extraction for restores.

use crate::archive::extract_archive;
use crate::bundle::{create_bundle, unpack_bundle};
use crate::dumper::{DumpEngine, DumpOutcome};
use crate::engine::{connect, DatabaseEngine};
use crate::error::{BackupError, Result};
use crate::filters::{FilterPolicy, FilterRequest};
use crate::manifest::BackupManifest;
use crate::paths::{PathOverrides, PathPlanner};
use crate::restore::{
    is_bundle, validate_dir_writable, validate_restore_preconditions, RestoreEngine,
    RestoreMode, RestoreOutcome, RestoreRequest,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDateTime};
use sitekeep_core::Site;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Options of one backup run.
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub filters: FilterRequest,
    pub overrides: PathOverrides,
    pub with_files: bool,
    pub compress: bool,
}

/// Everything a backup run produced.
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub policy: FilterPolicy,
    pub outcome: DumpOutcome,
    /// Present when a bundle was written
    pub manifest: Option<BackupManifest>,
}

/// Opens the database engine configured for a site.
pub fn open_engine(site: &Site) -> Result<Box<dyn DatabaseEngine>> {
    let settings = site.load_config()?.database()?;
    debug!("Site {} uses {}", site.name(), settings.db_type);
    Ok(connect(site, &settings)?)
}

/// Backs up a site using its configured database.
pub fn run_backup(site: &Site, options: &BackupOptions) -> Result<BackupReport> {
    let engine = open_engine(site)?;
    run_backup_with(site, engine.as_ref(), options, Local::now().naive_local())
}

/// Backs up a site through `engine`, naming artifacts after `timestamp`.
pub fn run_backup_with(
    site: &Site,
    engine: &dyn DatabaseEngine,
    options: &BackupOptions,
    timestamp: NaiveDateTime,
) -> Result<BackupReport> {
    let config = site.load_config()?;
    let policy = FilterPolicy::resolve(&options.filters, &config.backup_filters()?)?;
    debug!(
        "Filter policy: {} includes, {} excludes, partial={}",
        policy.includes().len(),
        policy.excludes().len(),
        policy.is_partial()
    );

    let tables = policy.select(&engine.list_tables()?)?;

    let planner = PathPlanner::new(site, options.overrides.clone());
    let paths = planner.plan(
        &timestamp,
        policy.is_partial(),
        options.with_files,
        options.compress,
    );

    let outcome = DumpEngine::new(engine).run(site, &paths, &tables)?;
    let manifest = if options.compress {
        match create_bundle(&outcome) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Bundling failed, removing backup {}: {}", outcome.paths.stem, e);
                outcome.discard();
                return Err(e);
            }
        }
    } else {
        None
    };

    Ok(BackupReport {
        policy,
        outcome,
        manifest,
    })
}

/// Options of one restore run.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// A database dump or a bundle
    pub source: Utf8PathBuf,
    pub mode: RestoreMode,
    /// Public files archive to extract into the site
    pub public_files: Option<Utf8PathBuf>,
    /// Private files archive to extract into the site
    pub private_files: Option<Utf8PathBuf>,
    /// Extract the file archives stored in a bundle
    pub with_bundled_files: bool,
}

impl RestoreOptions {
    pub fn new(source: impl Into<Utf8PathBuf>, mode: RestoreMode) -> Self {
        Self {
            source: source.into(),
            mode,
            public_files: None,
            private_files: None,
            with_bundled_files: false,
        }
    }
}

/// Everything a restore run did.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub outcome: RestoreOutcome,
    /// Manifest of the restored bundle
    pub manifest: Option<BackupManifest>,
    pub files_extracted: usize,
}

/// Restores a site using its configured database.
pub fn run_restore(site: &Site, options: &RestoreOptions) -> Result<RestoreReport> {
    let engine = open_engine(site)?;
    run_restore_with(site, engine.as_ref(), options)
}

/// Restores a site through `engine`.
pub fn run_restore_with(
    site: &Site,
    engine: &dyn DatabaseEngine,
    options: &RestoreOptions,
) -> Result<RestoreReport> {
    let mut public_files = options.public_files.clone();
    let mut private_files = options.private_files.clone();

    // The unpacked bundle lives until the restore is over
    let (database, manifest, _unpacked_dir) = if is_bundle(&options.source) {
        validate_restore_preconditions(&options.source)?;
        let temp = TempDir::new().map_err(|e| BackupError::io(site.dir(), e))?;
        let unpacked = unpack_bundle(&options.source, &utf8_dir(&temp)?)?;
        if options.with_bundled_files {
            public_files = public_files.or(unpacked.public_files);
            private_files = private_files.or(unpacked.private_files);
        }
        (unpacked.database, Some(unpacked.manifest), Some(temp))
    } else {
        (options.source.clone(), None, None)
    };

    let archives: Vec<Utf8PathBuf> = public_files.into_iter().chain(private_files).collect();
    for archive in &archives {
        validate_restore_preconditions(archive)?;
    }
    if !archives.is_empty() {
        validate_dir_writable(site.dir())?;
    }

    let request = RestoreRequest {
        database_path: database,
        mode: options.mode,
    };
    let outcome = RestoreEngine::new(engine).restore(&request)?;

    let mut files_extracted = 0;
    for archive in &archives {
        info!("Extracting {} into {}", archive, site.dir());
        files_extracted += extract_archive(archive, site.dir())?;
    }

    Ok(RestoreReport {
        outcome,
        manifest,
        files_extracted,
    })
}

fn utf8_dir(temp: &TempDir) -> Result<Utf8PathBuf> {
    Utf8Path::from_path(temp.path())
        .map(Utf8Path::to_owned)
        .ok_or_else(|| {
            BackupError::io(
                Utf8Path::new("."),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("temporary directory is not UTF-8: {}", temp.path().display()),
                ),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SqliteEngine;
    use crate::error::ErrorKind;
    use crate::registry::{BackupRegistry, DirectoryListing};
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use sitekeep_core::TableName;
    use std::fs;

    fn bench() -> (tempfile::TempDir, Site, SqliteEngine) {
        let temp = tempfile::TempDir::new().unwrap();
        let sites = Utf8PathBuf::from_path_buf(temp.path().join("sites")).unwrap();
        let dir = sites.join("site1.local");
        fs::create_dir_all(dir.join("public/files")).unwrap();
        fs::write(dir.join("public/files/logo.png"), b"png").unwrap();
        fs::write(
            dir.join("site_config.json"),
            r#"{"db_type": "sqlite", "db_name": "site1"}"#,
        )
        .unwrap();

        let db = dir.join("site1.db");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE \"tabToDo\" (name TEXT PRIMARY KEY, status TEXT);
             INSERT INTO \"tabToDo\" VALUES ('a', 'Open'), ('b', 'Closed');
             CREATE TABLE \"tabNote\" (name TEXT PRIMARY KEY);
             INSERT INTO \"tabNote\" VALUES ('n1');",
        )
        .unwrap();

        let site = Site::open(&sites, "site1.local").unwrap();
        (temp, site, SqliteEngine::new(db))
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn only(names: &str) -> BackupOptions {
        BackupOptions {
            filters: FilterRequest {
                include: TableName::parse_list(names).unwrap(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_open_engine_uses_site_config() {
        let (_temp, site, _) = bench();
        let engine = open_engine(&site).unwrap();
        assert_eq!(engine.kind().as_str(), "sqlite");
    }

    #[test]
    fn test_partial_backup_is_registered_as_partial() {
        let (_temp, site, engine) = bench();
        let report = run_backup_with(&site, &engine, &only("ToDo"), at(10)).unwrap();

        assert!(report.policy.is_partial());
        assert!(report.outcome.paths.stem.ends_with("-partial"));
        let registry = BackupRegistry::new(DirectoryListing::new(site.backup_dir()));
        assert!(registry.latest_full().unwrap().is_none());
        assert_eq!(
            registry.latest_partial().unwrap().unwrap().database,
            report.outcome.paths.database
        );
    }

    #[test]
    fn test_unknown_include_writes_nothing() {
        let (_temp, site, engine) = bench();
        let err = run_backup_with(&site, &engine, &only("Missing"), at(10)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Policy);
        assert!(!site.backup_dir().exists());
    }

    #[test]
    fn test_bundle_restore_with_files() {
        let (_temp, site, engine) = bench();
        let options = BackupOptions {
            with_files: true,
            compress: true,
            ..Default::default()
        };
        let report = run_backup_with(&site, &engine, &options, at(11)).unwrap();
        let bundle = report.outcome.paths.bundle.clone().unwrap();
        assert!(report.manifest.is_some());

        fs::remove_file(site.dir().join("public/files/logo.png")).unwrap();
        let conn = Connection::open(engine.path()).unwrap();
        conn.execute("DELETE FROM \"tabToDo\"", []).unwrap();
        drop(conn);

        let mut restore = RestoreOptions::new(&bundle, RestoreMode::Full);
        restore.with_bundled_files = true;
        let restored = run_restore_with(&site, &engine, &restore).unwrap();

        assert!(restored.manifest.is_some());
        assert_eq!(restored.files_extracted, 2);
        assert_eq!(
            fs::read(site.dir().join("public/files/logo.png")).unwrap(),
            b"png"
        );
        let conn = Connection::open(engine.path()).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM \"tabToDo\"", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_missing_archive_fails_before_restore() {
        let (_temp, site, engine) = bench();
        let report = run_backup_with(&site, &engine, &BackupOptions::default(), at(12)).unwrap();

        let mut restore = RestoreOptions::new(&report.outcome.paths.database, RestoreMode::Full);
        restore.public_files = Some(site.dir().join("missing-files.tar"));
        let err = run_restore_with(&site, &engine, &restore).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}

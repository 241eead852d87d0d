//! Restore system
//!
//! Re-imports a SQL dump into a site's database. A restore runs in stages:
//! validate the dump, scan its table definitions, plan the import (including
//! the schema check for partial restores) and only then touch the database.

use crate::compression::open_maybe_gzip;
use crate::dump::DumpScan;
use crate::engine::DatabaseEngine;
use crate::error::{BackupError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use sitekeep_core::TableName;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub mod analysis;
pub mod modes;
pub mod validation;

pub use analysis::plan_import;
pub use modes::RestoreMode;
pub use validation::{validate_dir_writable, validate_restore_preconditions};

/// A single restore of one dump.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub database_path: Utf8PathBuf,
    pub mode: RestoreMode,
}

impl RestoreRequest {
    pub fn full(database_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            mode: RestoreMode::Full,
        }
    }

    pub fn partial(database_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            mode: RestoreMode::Partial,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub mode: RestoreMode,
    /// Tables replaced from the dump
    pub restored: Vec<TableName>,
    /// Live tables removed because the dump did not define them
    pub dropped: Vec<TableName>,
    pub duration: Duration,
}

/// Applies dumps to a database engine.
pub struct RestoreEngine<'a> {
    engine: &'a dyn DatabaseEngine,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(engine: &'a dyn DatabaseEngine) -> Self {
        Self { engine }
    }

    pub fn restore(&self, request: &RestoreRequest) -> Result<RestoreOutcome> {
        let start = Instant::now();
        let path = request.database_path.as_path();

        info!(
            "Starting restore: dump={}, mode={}, engine={}",
            path,
            request.mode,
            self.engine.kind()
        );

        info!("Stage 1/4: Validating preconditions");
        validate_restore_preconditions(path)?;

        info!("Stage 2/4: Scanning dump");
        let scan = DumpScan::scan_file(path, self.engine.kind().into())?;
        if scan.is_empty() {
            warn!("Dump {} defines no tables; nothing to restore", path);
            return Ok(RestoreOutcome {
                mode: request.mode,
                restored: Vec::new(),
                dropped: Vec::new(),
                duration: start.elapsed(),
            });
        }

        info!("Stage 3/4: Planning import");
        let plan = plan_import(self.engine, &scan, request.mode)?;

        info!(
            "Stage 4/4: Importing {} tables ({} to drop)",
            plan.replace.len(),
            plan.drop.len()
        );
        let mut reader = open_maybe_gzip(path).map_err(|e| BackupError::dump_unreadable(path, e.to_string()))?;
        self.engine.import_dump(&mut reader, &plan)?;

        let duration = start.elapsed();
        info!("Restore complete: {} tables in {:?}", plan.replace.len(), duration);

        Ok(RestoreOutcome {
            mode: plan.mode,
            restored: plan.replace,
            dropped: plan.drop,
            duration,
        })
    }
}

/// Whether a path looks like a bundle rather than a bare dump.
pub fn is_bundle(path: &Utf8Path) -> bool {
    path.as_str().ends_with(".tgz") || path.as_str().ends_with(".tar.gz")
}

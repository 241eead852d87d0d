//! sitekeep Backup System
//!
//! This crate provides backup and restore functionality for sitekeep sites.
//! A backup is a gzip SQL dump of a filtered set of tables, optionally joined
//! by tar archives of the site's public and private files, a snapshot of its
//! configuration and a single-file bundle with a checksum manifest.
//!
//! # Features
//!
//! ## Backup
//! - **Layered table filters**: invocation includes/excludes over persisted `backup` config
//! - **Deterministic paths**: `<YYYYMMDD_HHMMSS>-<site>[-partial]-<suffix>`
//! - **Atomic visibility**: artifacts appear only once all of them are written
//! - **Bundles**: `.tgz` with a JSON manifest and SHA256 checksums
//!
//! ## Restore
//! - **Full restore**: the database ends up holding exactly the dump's tables
//! - **Partial restore**: only the dump's tables are replaced, after a schema check
//! - **Bundle restore**: unpacked, verified, then restored
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use sitekeep_backup::{run_backup, BackupOptions, BackupRegistry, DirectoryListing};
//! use sitekeep_core::Site;
//!
//! fn main() -> anyhow::Result<()> {
//!     let site = Site::open(Utf8Path::new("sites"), "site1.local")?;
//!     let report = run_backup(&site, &BackupOptions::default())?;
//!     println!("{}", report.outcome.summary());
//!
//!     let registry = BackupRegistry::new(DirectoryListing::new(site.backup_dir()));
//!     if let Some(latest) = registry.latest_full()? {
//!         println!("Latest full backup: {}", latest.database);
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod bundle;
pub mod compression;
pub mod dump;
pub mod dumper;
pub mod engine;
pub mod error;
pub mod filters;
pub mod job;
pub mod manifest;
pub mod paths;
pub mod registry;
pub mod restore;

// Re-export commonly used types
pub use bundle::{create_bundle, unpack_bundle, UnpackedBundle};
pub use compression::{calculate_checksum, DEFAULT_COMPRESSION_LEVEL};
pub use dump::{DumpScan, DumpTable, SqlDialect};
pub use dumper::{Artifact, ArtifactKind, DumpEngine, DumpOutcome};
pub use engine::{
    connect, DatabaseEngine, EngineKind, EngineResult, ImportPlan, MariaDbEngine, PostgresEngine,
    SqliteEngine,
};
pub use error::{BackupError, EngineError, ErrorKind, Result};
pub use filters::{FilterPolicy, FilterRequest, ALWAYS_INCLUDE};
pub use job::{
    open_engine, run_backup, run_backup_with, run_restore, run_restore_with, BackupOptions,
    BackupReport, RestoreOptions, RestoreReport,
};
pub use manifest::{human_bytes, BackupManifest, MANIFEST_FILENAME, MANIFEST_VERSION};
pub use paths::{BackupPaths, PathOverrides, PathPlanner};
pub use registry::{BackupListing, BackupRecord, BackupRegistry, DirectoryListing};
pub use restore::{RestoreEngine, RestoreMode, RestoreOutcome, RestoreRequest};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

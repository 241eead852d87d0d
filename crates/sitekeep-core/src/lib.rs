//! # sitekeep-core
//!
//! Core library for sitekeep providing:
//! - Site directory resolution (config, file storage and backup locations)
//! - Site configuration parsing (`site_config.json` over `common_site_config.json`)
//! - Case-insensitive table names
//! - The recorder on/off switch

pub mod config;
pub mod error;
pub mod recorder;
pub mod site;
pub mod table;

pub use config::{BackupFilterConfig, DatabaseSettings, DbType, SiteConfig};
pub use error::{Error, Result};
pub use recorder::{InMemoryRecorder, Recorder, SiteRecorder};
pub use site::Site;
pub use table::TableName;

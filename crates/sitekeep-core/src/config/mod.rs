//! Site configuration loading and typed settings

mod loader;
mod settings;

pub use loader::SiteConfig;
pub use settings::{BackupFilterConfig, DatabaseSettings, DbType};

//! Error types for sitekeep-core

use thiserror::Error;

/// Result type alias using sitekeep-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for sitekeep
#[derive(Error, Debug)]
pub enum Error {
    /// Site directory not found under the sites directory
    #[error("Site not found: {name} (looked in {sites_dir})")]
    SiteNotFound { name: String, sites_dir: String },

    /// No site was selected for a site-scoped command
    #[error("No site selected. Pass --site or set SITEKEEP_SITE")]
    NoSiteSelected,

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid table name
    #[error("Invalid table name: {name:?}")]
    InvalidTableName { name: String },
}

impl Error {
    /// Create a site not found error
    pub fn site_not_found(name: impl Into<String>, sites_dir: impl Into<String>) -> Self {
        Self::SiteNotFound {
            name: name.into(),
            sites_dir: sites_dir.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid table name error
    pub fn invalid_table_name(name: impl Into<String>) -> Self {
        Self::InvalidTableName { name: name.into() }
    }
}

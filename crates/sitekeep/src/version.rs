//! Version information for the sitekeep CLI

use serde::Serialize;

/// Version information
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    /// Semantic version
    pub version: String,

    /// Version of the backup library
    pub backup_library: String,

    /// Git commit SHA (short)
    pub commit: Option<String>,

    /// Build date
    pub build_date: Option<String>,
}

impl VersionInfo {
    /// Create version info for current build
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            backup_library: sitekeep_backup::VERSION.to_string(),
            commit: option_env!("GIT_SHA").map(String::from),
            build_date: option_env!("BUILD_DATE").map(String::from),
        }
    }

    /// Format as display string
    pub fn display(&self) -> String {
        match &self.commit {
            Some(commit) => format!("sitekeep {} ({})", self.version, commit),
            None => format!("sitekeep {}", self.version),
        }
    }
}

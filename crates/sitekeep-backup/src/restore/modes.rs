//! Restore modes: full and partial
//!
//! A full restore makes the database match the dump: tables missing from the
//! dump are dropped. A partial restore only touches the tables the dump defines.

use crate::error::BackupError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How a dump is applied to the live database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    /// Replace the whole database with the dump
    #[default]
    Full,
    /// Replace only the tables defined in the dump
    Partial,
}

impl RestoreMode {
    /// Get mode name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
        }
    }

    /// Whether live tables absent from the dump are dropped
    pub fn drops_missing_tables(&self) -> bool {
        *self == Self::Full
    }

    /// Whether dump tables are checked against live schemas first
    pub fn checks_schema(&self) -> bool {
        *self == Self::Partial
    }
}

impl FromStr for RestoreMode {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "partial" => Ok(Self::Partial),
            _ => Err(BackupError::invalid_policy(format!(
                "Invalid restore mode: {}. Valid modes: full, partial",
                s
            ))),
        }
    }
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

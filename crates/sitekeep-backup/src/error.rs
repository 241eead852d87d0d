//! Error types for backup and restore operations

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use thiserror::Error;

/// Result type alias for backup operations.
pub type Result<T> = std::result::Result<T, BackupError>;

/// Failures reported by a [`DatabaseEngine`](crate::engine::DatabaseEngine).
#[derive(Error, Debug)]
pub enum EngineError {
    /// A client tool (`mysqldump`, `psql`, ...) is not installed
    #[error("Required tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// A client tool ran but failed
    #[error("{tool} failed ({status}): {stderr}")]
    CommandFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The database could not be reached or opened
    #[error("Database unreachable: {message}")]
    Unreachable { message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error while talking to the database: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid database settings: {0}")]
    Settings(#[from] sitekeep_core::Error),
}

impl EngineError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }
}

/// Broad failure classes, used for exit codes and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Policy,
    Io,
    Engine,
    SchemaConflict,
}

/// Errors produced by backup and restore operations.
#[derive(Error, Debug)]
pub enum BackupError {
    /// An explicitly requested table does not exist
    #[error("Table not found in site schema: {table}")]
    UnknownTable { table: String },

    /// Filter configuration is unusable
    #[error("Invalid backup filter configuration: {message}")]
    InvalidPolicy { message: String },

    /// Filesystem failure at a specific path
    #[error("IO error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Database engine error: {0}")]
    Engine(#[from] EngineError),

    /// A dump table exists live with a different shape
    #[error(
        "Schema conflict on table {table}: live columns [{live}] differ from dump columns [{dump}]"
    )]
    SchemaConflict {
        table: String,
        live: String,
        dump: String,
    },

    /// The dump could not be decompressed or parsed
    #[error("Unreadable dump {path}: {reason}")]
    DumpUnreadable { path: Utf8PathBuf, reason: String },

    /// A bundle manifest is missing, unsupported or does not match its contents
    #[error("Invalid backup manifest: {message}")]
    Manifest { message: String },

    /// Site configuration could not be read
    #[error("Site configuration error: {0}")]
    Config(#[from] sitekeep_core::Error),
}

impl BackupError {
    pub fn io(path: &Utf8Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }

    pub fn invalid_policy(message: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            message: message.into(),
        }
    }

    pub fn dump_unreadable(path: &Utf8Path, reason: impl Into<String>) -> Self {
        Self::DumpUnreadable {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTable { .. } | Self::InvalidPolicy { .. } => ErrorKind::Policy,
            Self::Config(sitekeep_core::Error::Io(_)) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Policy,
            Self::Io { .. } | Self::DumpUnreadable { .. } | Self::Manifest { .. } => ErrorKind::Io,
            Self::Engine(_) => ErrorKind::Engine,
            Self::SchemaConflict { .. } => ErrorKind::SchemaConflict,
        }
    }
}

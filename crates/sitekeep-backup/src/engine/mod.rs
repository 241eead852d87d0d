//! Database engines.
//!
//! Everything the backup and restore engines need from a database goes
//! through [`DatabaseEngine`]: listing tables, reading a table's columns,
//! exporting SQL for a set of tables and importing a dump.

use crate::error::EngineError;
use crate::restore::RestoreMode;
use camino::Utf8PathBuf;
use serde::Serialize;
use sitekeep_core::{DatabaseSettings, DbType, Site, TableName};
use std::fmt;
use std::io::{Read, Write};

pub mod mariadb;
pub mod postgres;
pub mod process;
pub mod sqlite;

pub use mariadb::MariaDbEngine;
pub use postgres::PostgresEngine;
pub use sqlite::SqliteEngine;

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Database flavour behind an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    MariaDb,
    Postgres,
    Sqlite,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::MariaDb => "mariadb",
            EngineKind::Postgres => "postgres",
            EngineKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DbType> for EngineKind {
    fn from(db_type: DbType) -> Self {
        match db_type {
            DbType::MariaDb => EngineKind::MariaDb,
            DbType::Postgres => EngineKind::Postgres,
            DbType::Sqlite => EngineKind::Sqlite,
        }
    }
}

/// What an import must do besides running the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    pub mode: RestoreMode,
    /// Tables defined by the dump; replaced wholesale
    pub replace: Vec<TableName>,
    /// Live tables absent from the dump; dropped in full mode only
    pub drop: Vec<TableName>,
}

/// Access to a site's database.
pub trait DatabaseEngine {
    fn kind(&self) -> EngineKind;

    /// Base tables of the database, in catalog order.
    fn list_tables(&self) -> EngineResult<Vec<TableName>>;

    /// Column names of a table, or `None` when it does not exist.
    fn table_columns(&self, table: &TableName) -> EngineResult<Option<Vec<String>>>;

    /// Writes SQL that recreates exactly `tables` (definitions and rows).
    ///
    /// Callers never pass an empty list.
    fn export_tables(&self, tables: &[TableName], out: &mut dyn Write) -> EngineResult<()>;

    /// Runs a decompressed dump against the database according to `plan`.
    fn import_dump(&self, dump: &mut dyn Read, plan: &ImportPlan) -> EngineResult<()>;
}

/// Opens the engine configured for a site.
pub fn connect(site: &Site, settings: &DatabaseSettings) -> EngineResult<Box<dyn DatabaseEngine>> {
    let engine: Box<dyn DatabaseEngine> = match settings.db_type {
        DbType::MariaDb => Box::new(MariaDbEngine::new(settings)?),
        DbType::Postgres => Box::new(PostgresEngine::new(settings)?),
        DbType::Sqlite => Box::new(SqliteEngine::new(sqlite_path(site, settings)?)),
    };
    Ok(engine)
}

/// SQLite database file: `db_path`, else `<db_name>.db`, inside the site directory.
fn sqlite_path(site: &Site, settings: &DatabaseSettings) -> EngineResult<Utf8PathBuf> {
    match settings.db_path.as_deref() {
        Some(path) if !path.is_empty() => Ok(site.resolve(path)),
        _ => Ok(site.dir().join(format!("{}.db", settings.require_name()?))),
    }
}

/// Quotes an identifier with double quotes (PostgreSQL, SQLite).
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal with standard SQL doubling.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

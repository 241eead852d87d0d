//! Typed views over site configuration keys

use super::loader::json_type;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Include/exclude lists persisted under the `backup` key.
///
/// Both `{"includes": ["ToDo"]}` and the nested form
/// `{"includes": {"includes": ["ToDo"]}}` are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupFilterConfig {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl BackupFilterConfig {
    pub(crate) fn from_value(value: Option<&Value>) -> Result<Self> {
        let backup = match value {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(Error::invalid_config(format!(
                    "backup must be an object, found {}",
                    json_type(other)
                )))
            }
        };

        Ok(Self {
            includes: table_list(backup.get("includes"), "includes")?,
            excludes: table_list(backup.get("excludes"), "excludes")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
}

fn table_list(value: Option<&Value>, key: &str) -> Result<Vec<String>> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(Value::Object(inner)) => return table_list(inner.get(key), key),
        Some(other) => {
            return Err(Error::invalid_config(format!(
                "backup.{} must be a list of names, found {}",
                key,
                json_type(other)
            )))
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(name) => Ok(name.clone()),
            other => Err(Error::invalid_config(format!(
                "backup.{} entries must be strings, found {}",
                key,
                json_type(other)
            ))),
        })
        .collect()
}

/// Database engine flavour of a site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[default]
    #[serde(alias = "mysql")]
    MariaDb,
    #[serde(alias = "postgresql")]
    Postgres,
    Sqlite,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::MariaDb => write!(f, "mariadb"),
            DbType::Postgres => write!(f, "postgres"),
            DbType::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Connection settings read from site configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub db_type: DbType,

    #[serde(default)]
    pub db_name: Option<String>,

    /// Defaults to the database name
    #[serde(default)]
    pub db_user: Option<String>,

    #[serde(default)]
    pub db_password: Option<String>,

    #[serde(default = "default_host")]
    pub db_host: String,

    #[serde(default)]
    pub db_port: Option<u16>,

    /// SQLite database file, relative to the site directory
    #[serde(default)]
    pub db_path: Option<String>,

    /// Directory holding the client tools (`mysqldump`, `pg_dump`, ...);
    /// `PATH` is searched when unset
    #[serde(default)]
    pub db_tools_dir: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl DatabaseSettings {
    /// Database name, required by the server engines.
    pub fn require_name(&self) -> Result<&str> {
        self.db_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::invalid_config("db_name is not set in site configuration"))
    }

    /// Login user, falling back to the database name.
    pub fn user(&self) -> Result<&str> {
        match self.db_user.as_deref() {
            Some(user) if !user.is_empty() => Ok(user),
            _ => self.require_name(),
        }
    }
}

//! Site configuration file loading, merging and persistence

use super::settings::{BackupFilterConfig, DatabaseSettings};
use crate::error::{Error, Result};
use camino::Utf8Path;
use serde_json::{Map, Value};
use std::fs;
use tracing::debug;

/// A site configuration document (`site_config.json`).
///
/// The document is kept as raw JSON so keys written by other tooling
/// survive a load/save cycle untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteConfig {
    values: Map<String, Value>,
}

impl SiteConfig {
    /// Creates a configuration from a JSON object.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Loads a configuration file. A missing file yields an empty configuration.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(values) => Ok(Self { values }),
            other => Err(Error::invalid_config(format!(
                "{} must contain a JSON object, found {}",
                path,
                json_type(&other)
            ))),
        }
    }

    /// Writes the configuration atomically (temp file + rename).
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = serde_json::to_string_pretty(&self.values)?;
        content.push('\n');

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Returns this configuration with `overlay`'s top-level keys taking precedence.
    pub fn overlay(mut self, overlay: SiteConfig) -> SiteConfig {
        for (key, value) in overlay.values {
            self.values.insert(key, value);
        }
        self
    }

    /// Looks up a value by dotted key (`backup.includes`).
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.values.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Sets a value by dotted key, creating intermediate objects.
    ///
    /// Intermediate values that are not objects are replaced.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::invalid_config(format!("Invalid key: {:?}", key)));
        }

        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| Error::invalid_config("Empty key"))?;

        let mut current = &mut self.values;
        for part in parents {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = entry
                .as_object_mut()
                .ok_or_else(|| Error::invalid_config(format!("Cannot descend into {:?}", part)))?;
        }
        current.insert(last.to_string(), value);
        Ok(())
    }

    /// Backup include/exclude lists persisted under the `backup` key.
    pub fn backup_filters(&self) -> Result<BackupFilterConfig> {
        BackupFilterConfig::from_value(self.values.get("backup"))
    }

    /// Database connection settings.
    pub fn database(&self) -> Result<DatabaseSettings> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| Error::invalid_config(format!("Invalid database settings: {}", e)))
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use serde_json::json;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::load(&temp_path(&dir, "site_config.json")).unwrap();
        assert!(config.get("db_name").is_none());
        assert!(config.backup_filters().unwrap().includes.is_empty());
    }

    #[test]
    fn test_load_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "site_config.json");
        fs::write(&path, "[1, 2]").unwrap();

        let err = SiteConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("must contain a JSON object"));
    }

    #[test]
    fn test_save_and_reload_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "site_config.json");
        fs::write(&path, json!({"db_name": "_abc", "maintenance_mode": 0}).to_string()).unwrap();

        let mut config = SiteConfig::load(&path).unwrap();
        config.set("backup", json!({"includes": ["ToDo"]})).unwrap();
        config.save(&path).unwrap();

        let reloaded = SiteConfig::load(&path).unwrap();
        assert_eq!(reloaded.get("maintenance_mode"), Some(&json!(0)));
        assert_eq!(reloaded.get("backup.includes"), Some(&json!(["ToDo"])));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_set_dotted_key_creates_objects() {
        let mut config = SiteConfig::default();
        config.set("backup.excludes", json!(["Error Log"])).unwrap();
        config.set("backup.includes", json!(["ToDo"])).unwrap();

        assert_eq!(
            config.get("backup"),
            Some(&json!({"excludes": ["Error Log"], "includes": ["ToDo"]}))
        );
    }

    #[test]
    fn test_set_replaces_scalar_parent() {
        let mut config = SiteConfig::default();
        config.set("backup", json!("off")).unwrap();
        config.set("backup.includes", json!(["Note"])).unwrap();
        assert_eq!(config.get("backup.includes"), Some(&json!(["Note"])));
    }

    #[test]
    fn test_set_rejects_empty_segments() {
        let mut config = SiteConfig::default();
        assert!(config.set("backup..includes", json!([])).is_err());
        assert!(config.set("", json!([])).is_err());
    }

    #[test]
    fn test_overlay_prefers_overlay_keys() {
        let base = SiteConfig::from_map(
            json!({"db_host": "a", "db_port": 3306})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let own = SiteConfig::from_map(json!({"db_host": "b"}).as_object().cloned().unwrap());

        let merged = base.overlay(own);
        assert_eq!(merged.get("db_host"), Some(&json!("b")));
        assert_eq!(merged.get("db_port"), Some(&json!(3306)));
    }
}

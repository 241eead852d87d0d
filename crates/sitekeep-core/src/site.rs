//! Site context
//!
//! A bench keeps every site in its own directory below `sites/`:
//!
//! ```text
//! sites/
//!   common_site_config.json
//!   site1.local/
//!     site_config.json
//!     public/files/
//!     private/files/
//!     private/backups/
//! ```

use crate::config::SiteConfig;
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// Per-site configuration file name.
pub const SITE_CONFIG_FILENAME: &str = "site_config.json";

/// Bench-wide configuration file name, shared by every site.
pub const COMMON_CONFIG_FILENAME: &str = "common_site_config.json";

/// A resolved site directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    name: String,
    sites_dir: Utf8PathBuf,
    dir: Utf8PathBuf,
}

impl Site {
    /// Opens an existing site below `sites_dir`.
    pub fn open(sites_dir: &Utf8Path, name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(Error::site_not_found(name, sites_dir.as_str()));
        }

        let dir = sites_dir.join(name);
        if !dir.is_dir() {
            return Err(Error::site_not_found(name, sites_dir.as_str()));
        }

        Ok(Self {
            name: name.to_string(),
            sites_dir: sites_dir.to_owned(),
            dir,
        })
    }

    /// Site name, e.g. `site1.local`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File-name friendly form of the site name (`site1_local`).
    pub fn slug(&self) -> String {
        self.name.replace('.', "_")
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn config_path(&self) -> Utf8PathBuf {
        self.dir.join(SITE_CONFIG_FILENAME)
    }

    pub fn common_config_path(&self) -> Utf8PathBuf {
        self.sites_dir.join(COMMON_CONFIG_FILENAME)
    }

    pub fn public_files_dir(&self) -> Utf8PathBuf {
        self.dir.join("public").join("files")
    }

    pub fn private_files_dir(&self) -> Utf8PathBuf {
        self.dir.join("private").join("files")
    }

    /// Default location for backups of this site.
    pub fn backup_dir(&self) -> Utf8PathBuf {
        self.dir.join("private").join("backups")
    }

    /// Resolves a path from site configuration against the site directory.
    pub fn resolve(&self, path: &str) -> Utf8PathBuf {
        let path = Utf8Path::new(path);
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.dir.join(path)
        }
    }

    /// Loads the effective configuration (common config overlaid by the site's own).
    pub fn load_config(&self) -> Result<SiteConfig> {
        let common = SiteConfig::load(&self.common_config_path())?;
        let own = SiteConfig::load(&self.config_path())?;
        Ok(common.overlay(own))
    }

    /// Loads only the site's own `site_config.json`.
    pub fn load_own_config(&self) -> Result<SiteConfig> {
        SiteConfig::load(&self.config_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn bench() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let sites = Utf8PathBuf::from_path_buf(temp.path().join("sites")).unwrap();
        std::fs::create_dir_all(sites.join("site1.local")).unwrap();
        (temp, sites)
    }

    #[test]
    fn test_open_existing_site() {
        let (_temp, sites) = bench();
        let site = Site::open(&sites, "site1.local").unwrap();

        assert_eq!(site.name(), "site1.local");
        assert_eq!(site.slug(), "site1_local");
        assert_eq!(site.backup_dir(), sites.join("site1.local/private/backups"));
        assert_eq!(site.public_files_dir(), sites.join("site1.local/public/files"));
        assert_eq!(site.private_files_dir(), sites.join("site1.local/private/files"));
    }

    #[test]
    fn test_open_missing_site() {
        let (_temp, sites) = bench();
        let err = Site::open(&sites, "missing.local").unwrap_err();
        assert!(matches!(err, Error::SiteNotFound { .. }));
    }

    #[test]
    fn test_open_rejects_path_like_names() {
        let (_temp, sites) = bench();
        assert!(Site::open(&sites, "../site1.local").is_err());
        assert!(Site::open(&sites, "").is_err());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let (_temp, sites) = bench();
        let site = Site::open(&sites, "site1.local").unwrap();
        assert_eq!(site.resolve("site.db"), sites.join("site1.local/site.db"));
        assert_eq!(site.resolve("/var/db/x.db"), Utf8PathBuf::from("/var/db/x.db"));
    }

    #[test]
    fn test_load_config_overlays_common() {
        let (_temp, sites) = bench();
        std::fs::write(
            sites.join(COMMON_CONFIG_FILENAME),
            json!({"db_host": "db.internal", "db_type": "mariadb"}).to_string(),
        )
        .unwrap();
        std::fs::write(
            sites.join("site1.local").join(SITE_CONFIG_FILENAME),
            json!({"db_name": "_abc", "db_type": "postgres"}).to_string(),
        )
        .unwrap();

        let site = Site::open(&sites, "site1.local").unwrap();
        let config = site.load_config().unwrap();
        assert_eq!(config.get("db_host"), Some(&json!("db.internal")));
        assert_eq!(config.get("db_type"), Some(&json!("postgres")));
        assert_eq!(config.get("db_name"), Some(&json!("_abc")));
    }
}

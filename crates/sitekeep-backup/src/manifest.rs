//! Backup manifest format and metadata.
//!
//! The manifest is stored as the first entry of every bundle, describing the
//! site, the tables dumped and a checksum for each bundled artifact.

use crate::error::{BackupError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitekeep_core::TableName;

/// Version of the backup manifest format.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Name of the manifest entry in a bundle.
pub const MANIFEST_FILENAME: &str = ".backup-manifest.json";

/// Supported checksum algorithm.
pub const CHECKSUM_ALGORITHM: &str = "sha256";

/// Bundle metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Manifest format version
    pub version: String,

    /// When the backup was created
    pub created_at: DateTime<Utc>,

    /// What created this backup (e.g., "sitekeep v0.3.0")
    pub created_by: String,

    /// Site name
    pub site: String,

    /// Database engine the dump was taken from
    pub engine: String,

    /// Whether the dump covers a subset of tables
    pub partial: bool,

    /// Tables defined by the dump
    pub tables: Vec<TableName>,

    /// Every artifact stored next to the manifest
    pub artifacts: Vec<ArtifactInfo>,
}

/// One file in a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Entry name inside the bundle
    pub name: String,

    pub size_bytes: u64,

    pub checksum: ChecksumInfo,
}

/// Checksum information for integrity verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumInfo {
    /// Hash algorithm (sha256)
    pub algorithm: String,

    /// Hex-encoded checksum value
    pub value: String,
}

impl ChecksumInfo {
    pub fn sha256(value: impl Into<String>) -> Self {
        Self {
            algorithm: CHECKSUM_ALGORITHM.to_string(),
            value: value.into(),
        }
    }
}

impl BackupManifest {
    /// Creates a new backup manifest.
    pub fn new(
        site: impl Into<String>,
        engine: impl Into<String>,
        partial: bool,
        tables: Vec<TableName>,
        artifacts: Vec<ArtifactInfo>,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            created_at: Utc::now(),
            created_by: format!("sitekeep v{}", env!("CARGO_PKG_VERSION")),
            site: site.into(),
            engine: engine.into(),
            partial,
            tables,
            artifacts,
        }
    }

    /// Serializes the manifest to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BackupError::manifest(format!("Failed to serialize manifest: {}", e)))
    }

    /// Deserializes a manifest from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| BackupError::manifest(format!("Failed to deserialize manifest: {}", e)))
    }

    /// Validates that the manifest is compatible with the current version.
    pub fn validate(&self) -> Result<()> {
        if self.version != MANIFEST_VERSION {
            return Err(BackupError::manifest(format!(
                "Incompatible manifest version: {} (expected {})",
                self.version, MANIFEST_VERSION
            )));
        }

        if let Some(artifact) = self
            .artifacts
            .iter()
            .find(|a| a.checksum.algorithm != CHECKSUM_ALGORITHM)
        {
            return Err(BackupError::manifest(format!(
                "Unsupported checksum algorithm for {}: {}",
                artifact.name, artifact.checksum.algorithm
            )));
        }

        if let Some(artifact) = self
            .artifacts
            .iter()
            .find(|a| a.name.contains('/') || a.name.contains('\\') || a.name.starts_with('.'))
        {
            return Err(BackupError::manifest(format!(
                "Invalid artifact name: {}",
                artifact.name
            )));
        }

        Ok(())
    }

    pub fn artifact(&self, name: &str) -> Option<&ArtifactInfo> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Total size of all artifacts in bytes.
    pub fn total_size(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size_bytes).sum()
    }
}

/// Formats bytes as a human-readable string.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

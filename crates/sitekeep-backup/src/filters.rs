//! Table filtering for backup operations.
//!
//! This module merges the include/exclude lists given on the command line
//! with the lists persisted in site configuration:
//! - `ignore_config` drops the persisted lists entirely
//! - a table named on the command line overrides the opposite configured list
//! - remaining lists are unioned, and a table in both sets is included

use crate::error::{BackupError, Result};
use sitekeep_core::{BackupFilterConfig, TableName};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Core platform tables that are always kept when includes come from configuration,
/// so a configured partial backup stays loadable.
pub const ALWAYS_INCLUDE: &[&str] = &["__Auth", "__global_search", "__UserSettings"];

/// Filters given for a single invocation.
#[derive(Debug, Clone, Default)]
pub struct FilterRequest {
    pub include: Vec<TableName>,
    pub exclude: Vec<TableName>,
    pub ignore_config: bool,
}

/// The effective table filter for one backup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    includes: BTreeSet<TableName>,
    excludes: BTreeSet<TableName>,
    ignore_config: bool,
    /// Includes named on the command line; these must exist.
    requested: BTreeSet<TableName>,
}

impl FilterPolicy {
    /// Merges invocation filters with the persisted configuration.
    pub fn resolve(request: &FilterRequest, config: &BackupFilterConfig) -> Result<Self> {
        let (config_includes, config_excludes) = if request.ignore_config {
            debug!("Ignoring persisted backup configuration");
            (BTreeSet::new(), BTreeSet::new())
        } else {
            (
                parse_config_list(&config.includes, "includes")?,
                parse_config_list(&config.excludes, "excludes")?,
            )
        };

        let requested: BTreeSet<TableName> = request.include.iter().cloned().collect();
        let cli_excludes: BTreeSet<TableName> = request.exclude.iter().cloned().collect();

        let mut includes = requested.clone();
        let configured: Vec<TableName> = config_includes
            .into_iter()
            .filter(|t| !cli_excludes.contains(t))
            .collect();
        if !configured.is_empty() {
            includes.extend(configured);
            for base in ALWAYS_INCLUDE {
                includes.insert(TableName::new(*base)?);
            }
        }

        let mut excludes = cli_excludes;
        excludes.extend(config_excludes.into_iter().filter(|t| !requested.contains(t)));
        excludes.retain(|t| !includes.contains(t));

        Ok(Self {
            includes,
            excludes,
            ignore_config: request.ignore_config,
            requested,
        })
    }

    pub fn includes(&self) -> &BTreeSet<TableName> {
        &self.includes
    }

    pub fn excludes(&self) -> &BTreeSet<TableName> {
        &self.excludes
    }

    pub fn ignore_config(&self) -> bool {
        self.ignore_config
    }

    /// True when the policy selects less than every table.
    pub fn is_partial(&self) -> bool {
        !self.includes.is_empty() || !self.excludes.is_empty()
    }

    /// Checks whether a table belongs in the dump.
    pub fn should_dump(&self, table: &TableName) -> bool {
        if self.includes.is_empty() {
            !self.excludes.contains(table)
        } else {
            self.includes.contains(table)
        }
    }

    /// Selects the tables to dump from the live table list, in listing order.
    ///
    /// Fails when a table requested on the command line does not exist.
    pub fn select(&self, existing: &[TableName]) -> Result<Vec<TableName>> {
        let live: HashSet<&TableName> = existing.iter().collect();

        if let Some(missing) = self.requested.iter().find(|t| !live.contains(t)) {
            return Err(BackupError::UnknownTable {
                table: missing.to_string(),
            });
        }

        for table in self.includes.iter().filter(|t| !live.contains(t)) {
            if !ALWAYS_INCLUDE.iter().any(|b| b.eq_ignore_ascii_case(table.as_str())) {
                warn!("Configured backup include {} does not exist, skipping", table);
            }
        }
        for table in self.excludes.iter().filter(|t| !live.contains(t)) {
            debug!("Excluded table {} does not exist", table);
        }

        Ok(existing
            .iter()
            .filter(|t| self.should_dump(t))
            .cloned()
            .collect())
    }
}

fn parse_config_list(names: &[String], key: &str) -> Result<BTreeSet<TableName>> {
    names
        .iter()
        .map(|name| {
            TableName::from_doctype(name).map_err(|_| {
                BackupError::invalid_policy(format!("backup.{} contains an empty name", key))
            })
        })
        .collect()
}

//! Dump analysis: what a restore will do, decided before anything changes.

use super::modes::RestoreMode;
use crate::dump::DumpScan;
use crate::engine::{DatabaseEngine, ImportPlan};
use crate::error::{BackupError, Result};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Builds the import plan for a scanned dump.
///
/// In partial mode every dump table that already exists live must have the
/// same column names (compared case-insensitively); otherwise the restore is
/// refused with a schema conflict.
pub fn plan_import(
    engine: &dyn DatabaseEngine,
    scan: &DumpScan,
    mode: RestoreMode,
) -> Result<ImportPlan> {
    let live = engine.list_tables()?;
    info!(
        "Dump defines {} tables; database has {}",
        scan.tables().len(),
        live.len()
    );

    if mode.checks_schema() {
        for table in scan.tables() {
            if table.columns.is_empty() || !live.contains(&table.name) {
                continue;
            }
            let Some(live_columns) = engine.table_columns(&table.name)? else {
                continue;
            };
            if column_set(&live_columns) != column_set(&table.columns) {
                return Err(BackupError::SchemaConflict {
                    table: table.name.to_string(),
                    live: live_columns.join(", "),
                    dump: table.columns.join(", "),
                });
            }
            debug!("Schema of {} matches the dump", table.name);
        }
    }

    let drop = if mode.drops_missing_tables() {
        live.into_iter().filter(|t| !scan.defines(t)).collect()
    } else {
        Vec::new()
    };

    Ok(ImportPlan {
        mode,
        replace: scan.table_names(),
        drop,
    })
}

fn column_set(columns: &[String]) -> BTreeSet<String> {
    columns.iter().map(|c| c.to_lowercase()).collect()
}

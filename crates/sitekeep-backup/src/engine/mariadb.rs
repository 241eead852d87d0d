//! MariaDB/MySQL engine driving `mysql` and `mysqldump`.

use super::process::ToolCommand;
use super::{DatabaseEngine, EngineKind, EngineResult, ImportPlan};
use sitekeep_core::{DatabaseSettings, TableName};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::debug;

const CLIENT: &str = "mysql";
const DUMP: &str = "mysqldump";

/// Connection details for a MariaDB database.
#[derive(Debug, Clone)]
pub struct MariaDbEngine {
    database: String,
    user: String,
    password: Option<String>,
    host: String,
    port: Option<u16>,
    tools_dir: Option<PathBuf>,
}

impl MariaDbEngine {
    pub fn new(settings: &DatabaseSettings) -> EngineResult<Self> {
        Ok(Self {
            database: settings.require_name()?.to_string(),
            user: settings.user()?.to_string(),
            password: settings.db_password.clone(),
            host: settings.db_host.clone(),
            port: settings.db_port,
            tools_dir: settings.db_tools_dir.as_ref().map(PathBuf::from),
        })
    }

    fn command(&self, tool: &'static str) -> EngineResult<ToolCommand> {
        let mut cmd = ToolCommand::new(tool, self.tools_dir.as_deref())?;
        cmd.arg(format!("--host={}", self.host))
            .arg(format!("--user={}", self.user));
        if let Some(port) = self.port {
            cmd.arg(format!("--port={}", port));
        }
        if let Some(password) = &self.password {
            cmd.env("MYSQL_PWD", password);
        }
        Ok(cmd)
    }

    /// Runs a query and returns one string per result row.
    fn query(&self, sql: &str) -> EngineResult<Vec<String>> {
        let mut cmd = self.command(CLIENT)?;
        cmd.args(["-N", "-B", "-e"]).arg(sql).arg(&self.database);
        let output = cmd.output_text()?;
        Ok(output
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn execute(&self, sql: &str) -> EngineResult<()> {
        self.query(sql).map(|_| ())
    }
}

/// Quotes an identifier with backticks.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quotes a string literal, escaping backslashes as the server expects.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn drop_statement(tables: &[TableName]) -> String {
    let names: Vec<String> = tables.iter().map(|t| quote_ident(t.as_str())).collect();
    format!(
        "SET FOREIGN_KEY_CHECKS = 0; DROP TABLE IF EXISTS {}; SET FOREIGN_KEY_CHECKS = 1;",
        names.join(", ")
    )
}

impl DatabaseEngine for MariaDbEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::MariaDb
    }

    fn list_tables(&self) -> EngineResult<Vec<TableName>> {
        let rows = self.query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )?;
        rows.into_iter()
            .map(|name| TableName::new(name).map_err(Into::into))
            .collect()
    }

    fn table_columns(&self, table: &TableName) -> EngineResult<Option<Vec<String>>> {
        let columns = self.query(&format!(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = {} \
             ORDER BY ordinal_position",
            quote_literal(table.as_str())
        ))?;
        Ok((!columns.is_empty()).then_some(columns))
    }

    fn export_tables(&self, tables: &[TableName], out: &mut dyn Write) -> EngineResult<()> {
        let mut cmd = self.command(DUMP)?;
        cmd.args(["--single-transaction", "--quick", "--lock-tables=false"])
            .arg(&self.database)
            .args(tables.iter().map(|t| t.as_str().to_string()));
        cmd.stream_stdout(out)
    }

    fn import_dump(&self, dump: &mut dyn Read, plan: &ImportPlan) -> EngineResult<()> {
        let mut cmd = self.command(CLIENT)?;
        cmd.arg(&self.database);
        cmd.feed_stdin(dump)?;

        if !plan.drop.is_empty() {
            debug!("Dropping {} tables not present in the dump", plan.drop.len());
            self.execute(&drop_statement(&plan.drop))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("tabTo`Do"), "`tabTo``Do`");
        assert_eq!(quote_literal("a\\b'c"), "'a\\\\b''c'");
    }

    #[test]
    fn test_drop_statement() {
        let tables = vec![
            TableName::new("tabA").unwrap(),
            TableName::new("tabActivity Log").unwrap(),
        ];
        assert_eq!(
            drop_statement(&tables),
            "SET FOREIGN_KEY_CHECKS = 0; DROP TABLE IF EXISTS `tabA`, `tabActivity Log`; \
             SET FOREIGN_KEY_CHECKS = 1;"
        );
    }

    #[test]
    fn test_requires_database_name() {
        let settings: DatabaseSettings = serde_json::from_str("{}").unwrap();
        assert!(MariaDbEngine::new(&settings).is_err());
    }

    #[cfg(unix)]
    mod with_tools {
        use super::*;
        use crate::engine::fake_tools::FakeTools;
        use crate::error::EngineError;
        use crate::restore::RestoreMode;
        use serde_json::json;

        fn engine(tools: &FakeTools) -> MariaDbEngine {
            let settings: DatabaseSettings = serde_json::from_value(json!({
                "db_name": "site1",
                "db_password": "secret",
                "db_port": 3307,
                "db_tools_dir": tools.path().to_str().unwrap(),
            }))
            .unwrap();
            MariaDbEngine::new(&settings).unwrap()
        }

        fn full_plan() -> ImportPlan {
            ImportPlan {
                mode: RestoreMode::Full,
                replace: vec![TableName::new("tabToDo").unwrap()],
                drop: vec![TableName::new("tabOld").unwrap()],
            }
        }

        #[test]
        fn test_export_arguments() {
            let tools = FakeTools::new();
            tools.install("mysqldump", "CREATE TABLE `tabToDo` (name varchar(140));\n", 0);

            let tables = vec![
                TableName::new("tabToDo").unwrap(),
                TableName::new("tabActivity Log").unwrap(),
            ];
            let mut out = Vec::new();
            engine(&tools).export_tables(&tables, &mut out).unwrap();

            assert_eq!(out, b"CREATE TABLE `tabToDo` (name varchar(140));\n");
            assert_eq!(
                tools.calls(),
                vec![
                    "mysqldump --host=localhost --user=site1 --port=3307 \
                     --single-transaction --quick --lock-tables=false site1 \
                     tabToDo tabActivity Log"
                ]
            );
        }

        #[test]
        fn test_import_runs_before_drop() {
            let tools = FakeTools::new();
            tools.install("mysql", "", 0);

            let mut dump: &[u8] = b"CREATE TABLE `tabToDo` (name varchar(140));";
            engine(&tools).import_dump(&mut dump, &full_plan()).unwrap();

            let calls = tools.calls();
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[0], "mysql --host=localhost --user=site1 --port=3307 site1");
            assert!(calls[1].contains("DROP TABLE IF EXISTS `tabOld`"));
            assert!(calls.iter().all(|c| !c.contains("secret")));
            assert_eq!(
                tools.stdin("mysql"),
                "CREATE TABLE `tabToDo` (name varchar(140));"
            );
        }

        #[test]
        fn test_failed_import_drops_nothing() {
            let tools = FakeTools::new();
            tools.install("mysql", "", 1);

            let mut dump: &[u8] = b"CREATE TABLE broken";
            let err = engine(&tools).import_dump(&mut dump, &full_plan()).unwrap_err();

            assert!(matches!(err, EngineError::CommandFailed { .. }));
            assert_eq!(tools.calls().len(), 1);
            assert!(!tools.calls()[0].contains("DROP"));
        }

        #[test]
        fn test_tools_dir_is_the_only_place_searched() {
            let tools = FakeTools::new();
            let err = engine(&tools)
                .export_tables(&[TableName::new("tabToDo").unwrap()], &mut Vec::new())
                .unwrap_err();
            assert!(matches!(err, EngineError::ToolNotFound { .. }));
        }
    }
}

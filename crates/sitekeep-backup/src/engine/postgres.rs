//! PostgreSQL engine driving `psql` and `pg_dump`.

use super::process::ToolCommand;
use super::{quote_ident, quote_literal, DatabaseEngine, EngineKind, EngineResult, ImportPlan};
use sitekeep_core::{DatabaseSettings, TableName};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::debug;

const CLIENT: &str = "psql";
const DUMP: &str = "pg_dump";

/// Schema holding site tables.
const SCHEMA: &str = "public";

#[derive(Debug, Clone)]
pub struct PostgresEngine {
    database: String,
    user: String,
    password: Option<String>,
    host: String,
    port: Option<u16>,
    tools_dir: Option<PathBuf>,
}

impl PostgresEngine {
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
            .arg(format!("--username={}", self.user))
            .arg("--no-password");
        if let Some(port) = self.port {
            cmd.arg(format!("--port={}", port));
        }
        if let Some(password) = &self.password {
            cmd.env("PGPASSWORD", password);
        }
        Ok(cmd)
    }

    fn query(&self, sql: &str) -> EngineResult<Vec<String>> {
        let mut cmd = self.command(CLIENT)?;
        cmd.arg(format!("--dbname={}", self.database))
            .args(["-At", "-v", "ON_ERROR_STOP=1", "-c"])
            .arg(sql);
        let output = cmd.output_text()?;
        Ok(output
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// `pg_dump -t` pattern matching exactly one table.
fn table_pattern(table: &TableName) -> String {
    format!("{}.{}", SCHEMA, quote_ident(table.as_str()))
}

fn drop_statement(tables: &[TableName]) -> String {
    let names: Vec<String> = tables.iter().map(table_pattern).collect();
    format!("DROP TABLE IF EXISTS {} CASCADE;", names.join(", "))
}

impl DatabaseEngine for PostgresEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn list_tables(&self) -> EngineResult<Vec<TableName>> {
        let rows = self.query(&format!(
            "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = {} ORDER BY tablename",
            quote_literal(SCHEMA)
        ))?;
        rows.into_iter()
            .map(|name| TableName::new(name).map_err(Into::into))
            .collect()
    }

    fn table_columns(&self, table: &TableName) -> EngineResult<Option<Vec<String>>> {
        let columns = self.query(&format!(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = {} AND lower(table_name) = lower({}) \
             ORDER BY ordinal_position",
            quote_literal(SCHEMA),
            quote_literal(table.as_str())
        ))?;
        Ok((!columns.is_empty()).then_some(columns))
    }

    fn export_tables(&self, tables: &[TableName], out: &mut dyn Write) -> EngineResult<()> {
        let mut cmd = self.command(DUMP)?;
        cmd.args(["--no-owner", "--clean", "--if-exists"]);
        for table in tables {
            cmd.arg("-t").arg(table_pattern(table));
        }
        cmd.arg(&self.database);
        cmd.stream_stdout(out)
    }

    fn import_dump(&self, dump: &mut dyn Read, plan: &ImportPlan) -> EngineResult<()> {
        let mut cmd = self.command(CLIENT)?;
        cmd.arg(format!("--dbname={}", self.database))
            .args(["-q", "-v", "ON_ERROR_STOP=1", "--single-transaction"]);
        cmd.feed_stdin(dump)?;

        if !plan.drop.is_empty() {
            debug!("Dropping {} tables not present in the dump", plan.drop.len());
            self.query(&drop_statement(&plan.drop))?;
        }
        Ok(())
    }
}

//! In-process SQLite engine.

use super::{quote_ident, DatabaseEngine, EngineKind, EngineResult, ImportPlan};
use crate::error::EngineError;
use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use sitekeep_core::TableName;
use std::io::{Read, Write};
use tracing::debug;

/// Engine over a single SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    path: Utf8PathBuf,
}

impl SqliteEngine {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn open(&self) -> EngineResult<Connection> {
        if !self.path.is_file() {
            return Err(EngineError::unreachable(format!(
                "SQLite database not found: {}",
                self.path
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Ok(Connection::open_with_flags(&self.path, flags)?)
    }

    fn dump_table(conn: &Connection, table: &TableName, out: &mut dyn Write) -> EngineResult<()> {
        let (name, create_sql): (String, String) = conn.query_row(
            "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![table.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let quoted = quote_ident(&name);

        writeln!(out, "\n-- Table: {}", name)?;
        writeln!(out, "DROP TABLE IF EXISTS {};", quoted)?;
        writeln!(out, "{};", create_sql)?;

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quoted))?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(quote_ident)
            .collect();
        let column_list = columns.join(", ");

        let mut rows = stmt.query([])?;
        let mut count = 0usize;
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(sql_value))
                .collect::<Result<Vec<_>, _>>()?;
            writeln!(
                out,
                "INSERT INTO {} ({}) VALUES ({});",
                quoted,
                column_list,
                values.join(", ")
            )?;
            count += 1;
        }
        debug!("Dumped {} rows from {}", count, name);

        let mut idx_stmt = conn.prepare(
            "SELECT sql FROM sqlite_master \
             WHERE type = 'index' AND tbl_name = ?1 COLLATE NOCASE AND sql IS NOT NULL \
             ORDER BY name",
        )?;
        let indexes = idx_stmt
            .query_map(params![name], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for index in indexes {
            writeln!(out, "{};", index)?;
        }

        Ok(())
    }
}

/// Renders a value as an SQL literal.
fn sql_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(f) if f.is_infinite() => {
            let literal = if f > 0.0 { "9e999" } else { "-9e999" };
            literal.to_string()
        }
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(text) => format!("'{}'", text.replace('\'', "''")),
            // SQLite stores TEXT bytes unchecked; keep them exact
            Err(_) => format!("CAST(X'{}' AS TEXT)", hex::encode(t)),
        },
        ValueRef::Blob(b) => format!("X'{}'", hex::encode(b)),
    }
}

impl DatabaseEngine for SqliteEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    fn list_tables(&self) -> EngineResult<Vec<TableName>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        names
            .into_iter()
            .map(|n| TableName::new(n).map_err(EngineError::from))
            .collect()
    }

    fn table_columns(&self, table: &TableName) -> EngineResult<Option<Vec<String>>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![table.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((!columns.is_empty()).then_some(columns))
    }

    fn export_tables(&self, tables: &[TableName], out: &mut dyn Write) -> EngineResult<()> {
        let conn = self.open()?;
        // One read transaction keeps the export consistent across tables.
        conn.execute_batch("BEGIN DEFERRED")?;
        let result = tables
            .iter()
            .try_for_each(|table| Self::dump_table(&conn, table, out));
        conn.execute_batch("COMMIT")?;
        result
    }

    fn import_dump(&self, dump: &mut dyn Read, plan: &ImportPlan) -> EngineResult<()> {
        let mut sql = String::new();
        dump.read_to_string(&mut sql)?;

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        for table in plan.drop.iter().chain(plan.replace.iter()) {
            debug!("Dropping {} before import", table);
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(table.as_str())))?;
        }
        tx.execute_batch(&sql)?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::RestoreMode;
    use tempfile::TempDir;

    fn database() -> (TempDir, SqliteEngine) {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("site.db")).unwrap();
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE \"tabToDo\" (name TEXT PRIMARY KEY, status TEXT, score REAL, data BLOB);
             CREATE INDEX todo_status ON \"tabToDo\" (status);
             INSERT INTO \"tabToDo\" VALUES ('a', 'it''s open', 1.5, X'00ff');
             INSERT INTO \"tabToDo\" VALUES ('b', NULL, 2.0, NULL);
             CREATE TABLE \"tabNote\" (name TEXT, title TEXT);
             INSERT INTO \"tabNote\" VALUES ('n1', 'hello');",
        )
        .unwrap();
        (temp, SqliteEngine::new(path))
    }

    fn table(name: &str) -> TableName {
        TableName::new(name).unwrap()
    }

    fn export(engine: &SqliteEngine, tables: &[TableName]) -> String {
        let mut out = Vec::new();
        engine.export_tables(tables, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn count(engine: &SqliteEngine, table: &str) -> i64 {
        Connection::open(engine.path())
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_list_tables_in_creation_order() {
        let (_temp, engine) = database();
        assert_eq!(
            engine.list_tables().unwrap(),
            vec![table("tabToDo"), table("tabNote")]
        );
    }

    #[test]
    fn test_table_columns() {
        let (_temp, engine) = database();
        assert_eq!(
            engine.table_columns(&table("tabNote")).unwrap(),
            Some(vec!["name".to_string(), "title".to_string()])
        );
        assert_eq!(engine.table_columns(&table("tabMissing")).unwrap(), None);
    }

    #[test]
    fn test_export_only_requested_tables() {
        let (_temp, engine) = database();
        let sql = export(&engine, &[table("TABTODO")]);

        assert!(sql.contains("CREATE TABLE \"tabToDo\""));
        assert!(sql.contains("'it''s open'"));
        assert!(sql.contains("X'00ff'"));
        assert!(sql.contains("CREATE INDEX todo_status"));
        assert!(!sql.contains("tabNote"));
    }

    #[test]
    fn test_import_replaces_dumped_tables_only() {
        let (_temp, engine) = database();
        let sql = export(&engine, &[table("tabToDo")]);

        let conn = Connection::open(engine.path()).unwrap();
        conn.execute_batch("DELETE FROM \"tabToDo\"; INSERT INTO \"tabNote\" VALUES ('n2', 'x');")
            .unwrap();

        let plan = ImportPlan {
            mode: RestoreMode::Partial,
            replace: vec![table("tabToDo")],
            drop: Vec::new(),
        };
        engine.import_dump(&mut sql.as_bytes(), &plan).unwrap();

        assert_eq!(count(&engine, "tabToDo"), 2);
        assert_eq!(count(&engine, "tabNote"), 2);
    }

    #[test]
    fn test_failed_import_changes_nothing() {
        let (_temp, engine) = database();
        let plan = ImportPlan {
            mode: RestoreMode::Full,
            replace: vec![table("tabToDo")],
            drop: vec![table("tabNote")],
        };
        let mut broken: &[u8] = b"CREATE TABLE \"tabToDo\" (name TEXT); INSERT INTO nowhere VALUES (1);";

        assert!(engine.import_dump(&mut broken, &plan).is_err());
        assert_eq!(count(&engine, "tabToDo"), 2);
        assert_eq!(count(&engine, "tabNote"), 1);
    }

    #[test]
    fn test_missing_database_is_unreachable() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("missing.db")).unwrap();
        let err = SqliteEngine::new(path).list_tables().unwrap_err();
        assert!(matches!(err, EngineError::Unreachable { .. }));
    }

    #[test]
    fn test_sql_values() {
        assert_eq!(sql_value(ValueRef::Null), "NULL");
        assert_eq!(sql_value(ValueRef::Integer(-4)), "-4");
        assert_eq!(sql_value(ValueRef::Real(2.0)), "2.0");
        assert_eq!(sql_value(ValueRef::Text(b"a'b")), "'a''b'");
        assert_eq!(sql_value(ValueRef::Blob(&[0xde, 0xad])), "X'dead'");
        assert_eq!(sql_value(ValueRef::Text(&[0xff, 0x61])), "CAST(X'ff61' AS TEXT)");
    }

    #[test]
    fn test_invalid_utf8_text_survives_restore() {
        let (_temp, engine) = database();
        let conn = Connection::open(engine.path()).unwrap();
        conn.execute_batch("INSERT INTO \"tabNote\" VALUES ('n2', CAST(X'ff61' AS TEXT));")
            .unwrap();
        drop(conn);

        let sql = export(&engine, &[table("tabNote")]);
        assert!(sql.contains("CAST(X'ff61' AS TEXT)"));

        let fresh = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(fresh.path().join("fresh.db")).unwrap();
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE seed (x);")
            .unwrap();
        let target = SqliteEngine::new(path);
        let plan = ImportPlan {
            mode: RestoreMode::Full,
            replace: vec![table("tabNote")],
            drop: Vec::new(),
        };
        target.import_dump(&mut sql.as_bytes(), &plan).unwrap();

        let (bytes, kind): (String, String) = Connection::open(target.path())
            .unwrap()
            .query_row(
                "SELECT hex(title), typeof(title) FROM \"tabNote\" WHERE name = 'n2'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(bytes, "FF61");
        assert_eq!(kind, "text");
    }
}

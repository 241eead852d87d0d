//! Common test utilities for sitekeep-backup
//!
//! Provides a throwaway bench with one SQLite-backed site and helpers to
//! inspect its database and the dumps written for it.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use sitekeep_backup::{DumpScan, SqlDialect, SqliteEngine};
use sitekeep_core::{Site, TableName};
use std::fs;
use tempfile::TempDir;

pub const SITE_NAME: &str = "site1.local";

/// A bench directory holding `sites/site1.local` with a seeded SQLite database.
pub struct TestBench {
    _temp: TempDir,
    pub site: Site,
    pub engine: SqliteEngine,
}

impl TestBench {
    pub fn new() -> Self {
        Self::with_config(r#"{"db_type": "sqlite", "db_name": "site1"}"#)
    }

    pub fn with_config(site_config: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let sites = Utf8PathBuf::from_path_buf(temp.path().join("sites")).unwrap();
        let dir = sites.join(SITE_NAME);
        fs::create_dir_all(dir.join("public/files")).unwrap();
        fs::create_dir_all(dir.join("private/files")).unwrap();
        fs::write(dir.join("public/files/logo.png"), b"png").unwrap();
        fs::write(dir.join("private/files/invoice.pdf"), b"pdf").unwrap();
        fs::write(dir.join("site_config.json"), site_config).unwrap();

        let db = dir.join("site1.db");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE "__Auth" (doctype TEXT, name TEXT, password TEXT);
            INSERT INTO "__Auth" VALUES ('User', 'admin', 'hash');

            CREATE TABLE "tabToDo" (name TEXT PRIMARY KEY, status TEXT, description TEXT);
            INSERT INTO "tabToDo" VALUES ('t1', 'Open', 'it''s; tricky');
            INSERT INTO "tabToDo" VALUES ('t2', 'Closed', NULL);
            INSERT INTO "tabToDo" VALUES ('t3', 'Open', 'third');
            CREATE INDEX "status" ON "tabToDo" (status);

            CREATE TABLE "tabNote" (name TEXT PRIMARY KEY, title TEXT);
            INSERT INTO "tabNote" VALUES ('n1', 'First');
            INSERT INTO "tabNote" VALUES ('n2', 'Second');

            CREATE TABLE "tabError Log" (name TEXT PRIMARY KEY, error TEXT);
            INSERT INTO "tabError Log" VALUES ('e1', 'Traceback');
            "#,
        )
        .unwrap();

        let site = Site::open(&sites, SITE_NAME).unwrap();
        Self {
            _temp: temp,
            site,
            engine: SqliteEngine::new(db),
        }
    }

    pub fn conn(&self) -> Connection {
        Connection::open(self.engine.path()).unwrap()
    }

    pub fn row_count(&self, table: &str) -> i64 {
        self.conn()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |r| {
                r.get(0)
            })
            .unwrap()
    }

    pub fn table_exists(&self, table: &str) -> bool {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |r| r.get(0),
            )
            .unwrap();
        count == 1
    }

    pub fn execute(&self, sql: &str) {
        self.conn().execute_batch(sql).unwrap();
    }

    pub fn backup_dir(&self) -> Utf8PathBuf {
        self.site.backup_dir()
    }

    /// File names in the backup directory, sorted.
    pub fn backup_files(&self) -> Vec<String> {
        let dir = self.backup_dir();
        if !dir.exists() {
            return Vec::new();
        }
        let mut names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }
}

/// Table names defined by a dump, in dump order.
pub fn dumped_tables(path: &Utf8Path) -> Vec<String> {
    DumpScan::scan_file(path, SqlDialect::Sqlite)
        .unwrap()
        .tables()
        .iter()
        .map(|t| t.name.to_string())
        .collect()
}

pub fn tables(csv: &str) -> Vec<TableName> {
    TableName::parse_list(csv).unwrap()
}

/// A fixed timestamp on 2024-06-01.
pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

//! Integration tests for full and partial restores of a SQLite-backed site

mod common;

use common::*;
use sitekeep_backup::{
    run_backup_with, run_restore_with, BackupError, BackupOptions, ErrorKind, FilterRequest,
    RestoreEngine, RestoreMode, RestoreOptions, RestoreRequest,
};
use std::fs;

fn backup_only(bench: &TestBench, csv: &str) -> camino::Utf8PathBuf {
    let options = BackupOptions {
        filters: FilterRequest {
            include: tables(csv),
            ..Default::default()
        },
        ..Default::default()
    };
    run_backup_with(&bench.site, &bench.engine, &options, at(9, 0))
        .unwrap()
        .outcome
        .paths
        .database
}

#[test]
fn test_partial_restore_round_trip() {
    let bench = TestBench::new();
    let dump = backup_only(&bench, "ToDo");

    bench.execute(r#"DROP TABLE "tabToDo";"#);
    bench.execute(r#"INSERT INTO "tabNote" VALUES ('n3', 'Added after backup');"#);
    assert!(!bench.table_exists("tabToDo"));

    let outcome = RestoreEngine::new(&bench.engine)
        .restore(&RestoreRequest::partial(&dump))
        .unwrap();

    assert_eq!(outcome.restored.len(), 1);
    assert!(outcome.dropped.is_empty());
    assert_eq!(bench.row_count("tabToDo"), 3);
    assert_eq!(bench.row_count("tabNote"), 3);
    assert_eq!(bench.row_count("tabError Log"), 1);
    assert_eq!(bench.row_count("__Auth"), 1);
}

#[test]
fn test_partial_restore_preserves_values() {
    let bench = TestBench::new();
    let dump = backup_only(&bench, "ToDo");
    bench.execute(r#"UPDATE "tabToDo" SET description = 'changed';"#);

    RestoreEngine::new(&bench.engine)
        .restore(&RestoreRequest::partial(&dump))
        .unwrap();

    let conn = bench.conn();
    let description: String = conn
        .query_row(
            r#"SELECT description FROM "tabToDo" WHERE name = 't1'"#,
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(description, "it's; tricky");
    let missing: Option<String> = conn
        .query_row(
            r#"SELECT description FROM "tabToDo" WHERE name = 't2'"#,
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_schema_conflict_leaves_table_unchanged() {
    let bench = TestBench::new();
    let dump = backup_only(&bench, "ToDo");

    bench.execute(
        r#"ALTER TABLE "tabToDo" ADD COLUMN priority TEXT;
           DELETE FROM "tabToDo" WHERE name = 't3';"#,
    );

    let err = RestoreEngine::new(&bench.engine)
        .restore(&RestoreRequest::partial(&dump))
        .unwrap_err();

    assert!(matches!(err, BackupError::SchemaConflict { ref table, .. } if table == "tabToDo"));
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
    assert_eq!(bench.row_count("tabToDo"), 2);
}

#[test]
fn test_full_restore_drops_tables_missing_from_dump() {
    let bench = TestBench::new();
    let dump = backup_only(&bench, "ToDo,Note");
    bench.execute(r#"DELETE FROM "tabNote";"#);

    let outcome = RestoreEngine::new(&bench.engine)
        .restore(&RestoreRequest::full(&dump))
        .unwrap();

    assert_eq!(outcome.mode, RestoreMode::Full);
    assert_eq!(bench.row_count("tabNote"), 2);
    assert!(!bench.table_exists("tabError Log"));
    assert!(!bench.table_exists("__Auth"));
    assert_eq!(outcome.dropped.len(), 2);
}

#[test]
fn test_full_backup_then_full_restore() {
    let bench = TestBench::new();
    let report =
        run_backup_with(&bench.site, &bench.engine, &BackupOptions::default(), at(9, 0)).unwrap();
    bench.execute(
        r#"DROP TABLE "tabNote";
           CREATE TABLE "tabScratch" (name TEXT);"#,
    );

    let options = RestoreOptions::new(&report.outcome.paths.database, RestoreMode::Full);
    run_restore_with(&bench.site, &bench.engine, &options).unwrap();

    assert_eq!(bench.row_count("tabNote"), 2);
    assert!(!bench.table_exists("tabScratch"));
    // Indexes travel with their table
    let indexes: i64 = bench
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'status'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(indexes, 1);
}

#[test]
fn test_malformed_dump_touches_nothing() {
    let bench = TestBench::new();
    let path = bench.site.dir().join("broken.sql");
    fs::write(&path, "CREATE TABLE \"tabToDo\" (name TEXT, note TEXT DEFAULT 'oops);\n").unwrap();

    let err = RestoreEngine::new(&bench.engine)
        .restore(&RestoreRequest::partial(&path))
        .unwrap_err();

    assert!(matches!(err, BackupError::DumpUnreadable { .. }));
    assert_eq!(bench.row_count("tabToDo"), 3);
}

#[test]
fn test_missing_dump_is_io_error() {
    let bench = TestBench::new();
    let err = RestoreEngine::new(&bench.engine)
        .restore(&RestoreRequest::partial(bench.site.dir().join("nope.sql.gz")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_restore_from_bundle_with_files() {
    let bench = TestBench::new();
    let options = BackupOptions {
        with_files: true,
        compress: true,
        ..Default::default()
    };
    let report = run_backup_with(&bench.site, &bench.engine, &options, at(9, 0)).unwrap();
    let bundle = report.outcome.paths.bundle.clone().unwrap();

    fs::remove_file(bench.site.dir().join("private/files/invoice.pdf")).unwrap();
    bench.execute(r#"DELETE FROM "tabToDo";"#);

    let mut restore = RestoreOptions::new(&bundle, RestoreMode::Partial);
    restore.with_bundled_files = true;
    let restored = run_restore_with(&bench.site, &bench.engine, &restore).unwrap();

    assert_eq!(restored.manifest.unwrap().site, SITE_NAME);
    assert_eq!(bench.row_count("tabToDo"), 3);
    assert_eq!(
        fs::read(bench.site.dir().join("private/files/invoice.pdf")).unwrap(),
        b"pdf"
    );
}

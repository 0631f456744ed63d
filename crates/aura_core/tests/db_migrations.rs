use aura_core::db::migrations::{latest_version, schema_version, USER_SCOPED_TABLES};
use aura_core::{Database, DbError};
use rusqlite::Connection;

#[test]
fn open_in_memory_applies_all_migrations() {
    let db = Database::open_in_memory().unwrap();

    assert_eq!(schema_version(db.conn()).unwrap(), latest_version());
    for table in USER_SCOPED_TABLES {
        assert_table_exists(db.conn(), table);
    }
    db.close().unwrap();
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aura.db");

    let first = Database::open(&path).unwrap();
    assert_eq!(schema_version(first.conn()).unwrap(), latest_version());
    first.close().unwrap();

    let second = Database::open(&path).unwrap();
    assert_eq!(schema_version(second.conn()).unwrap(), latest_version());
    assert_table_exists(second.conn(), "habits");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = Database::open(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn store_without_user_scoping_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unscoped.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE habits (id INTEGER PRIMARY KEY, month_key TEXT, name TEXT);
         CREATE TABLE monthly_entries (month_key TEXT PRIMARY KEY, note TEXT);
         PRAGMA user_version = 2;",
    )
    .unwrap();
    drop(conn);

    match Database::open(&path).unwrap_err() {
        DbError::MissingUserScope { table } => assert_eq!(table, "habits"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn month_key_column_rejects_malformed_keys() {
    let db = Database::open_in_memory().unwrap();
    let result = db.conn().execute(
        "INSERT INTO habits (user_id, id, month_key, position, name) VALUES ('u', 1, '2024-9', 0, 'x');",
        [],
    );
    assert!(result.is_err());
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}

use bookmarks_core::db::migrations::latest_version;
use bookmarks_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "users");
    assert_table_exists(&conn, "bookmarks");
    assert_index_exists(&conn, "idx_bookmarks_owner_subject_name");
    assert_index_exists(&conn, "idx_bookmarks_subject");
}

#[test]
fn foreign_keys_are_enforced_on_open() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn unnamed_bookmarks_collide_through_the_sentinel() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO users (name) VALUES ('homer');", [])
        .unwrap();
    conn.execute(
        "INSERT INTO bookmarks (user_id, subject_type, subject_id) VALUES (1, 'Beer', 1);",
        [],
    )
    .unwrap();

    let err = conn
        .execute(
            "INSERT INTO bookmarks (user_id, subject_type, subject_id, name) VALUES (1, 'Beer', 1, NULL);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("UNIQUE"));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookmarks.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "bookmarks");
}

#[test]
fn upgrading_from_version_one_adds_the_subject_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    assert!(!schema_object_exists(&conn, "index", "idx_bookmarks_subject"));
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert_index_exists(&conn, "idx_bookmarks_subject");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
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

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_schema_object(conn, "table", table_name);
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_schema_object(conn, "index", index_name);
}

fn assert_schema_object(conn: &Connection, kind: &str, name: &str) {
    assert!(
        schema_object_exists(conn, kind, name),
        "{kind} {name} does not exist"
    );
}

fn schema_object_exists(conn: &Connection, kind: &str, name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}

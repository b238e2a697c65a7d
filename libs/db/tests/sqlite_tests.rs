//! Connection tests against SQLite (no external services required).

use db::{ConnectOpts, DbEngine, DbHandle};
use tempfile::TempDir;

#[tokio::test]
async fn test_sqlite_memory_connect_and_ping() {
    let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default())
        .await
        .expect("in-memory sqlite should connect");

    assert_eq!(db.engine(), DbEngine::Sqlite);
    db.ping().await.expect("ping should succeed");
    db.close().await;
}

#[tokio::test]
async fn test_sqlite_file_is_created_with_parent_dirs() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data").join("users.db");
    let dsn = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let db = DbHandle::connect(&dsn, ConnectOpts::default())
        .await
        .expect("file sqlite should connect");
    db.ping().await.expect("ping should succeed");
    db.close().await;

    assert!(db_path.exists(), "database file should exist at {db_path:?}");
}

#[tokio::test]
async fn test_ping_fails_after_close() {
    let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default())
        .await
        .unwrap();
    let sea = db.sea();
    db.close().await;

    assert!(sea.ping().await.is_err(), "closed pool must not answer pings");
}

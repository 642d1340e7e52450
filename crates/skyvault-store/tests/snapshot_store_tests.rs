//! Integration tests for SqliteSnapshotStore
//!
//! These tests verify the SnapshotStore port contract using an in-memory
//! SQLite database. Each test function creates a fresh database to ensure
//! test isolation.

use skyvault_core::domain::meta::FileState;
use skyvault_core::domain::relpath::RelPath;
use skyvault_core::ports::SnapshotStore;
use skyvault_store::{DatabasePool, SqliteSnapshotStore};

/// Create a fresh in-memory store for each test
async fn setup() -> SqliteSnapshotStore {
    let pool = DatabasePool::in_memory()
        .await
        .expect("failed to create in-memory database");
    SqliteSnapshotStore::new(pool.pool().clone())
}

fn state(path: &str, size: u64) -> FileState {
    FileState {
        rel_path: RelPath::new(path).unwrap(),
        file_size: size,
        mod_time: 1_700_000_000_000_000_000,
        local_hash: Some("0123456789abcdef0123456789abcdef".to_string()),
        remote_hash: Some("fedcba9876543210fedcba9876543210".to_string()),
        last_sync_time: 0,
    }
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let store = setup().await;
    let original = state("docs/report.pdf", 4096);

    store.put(&original).await.unwrap();

    let loaded = store
        .get(&original.rel_path)
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(loaded.rel_path, original.rel_path);
    assert_eq!(loaded.file_size, 4096);
    assert_eq!(loaded.mod_time, original.mod_time);
    assert_eq!(loaded.local_hash, original.local_hash);
    assert_eq!(loaded.remote_hash, original.remote_hash);
}

#[tokio::test]
async fn get_missing_returns_none() {
    let store = setup().await;
    let path = RelPath::new("nope.txt").unwrap();
    assert!(store.get(&path).await.unwrap().is_none());
}

#[tokio::test]
async fn put_stamps_last_sync_time() {
    let store = setup().await;
    let before = chrono::Utc::now().timestamp();

    store.put(&state("a.txt", 1)).await.unwrap();

    let loaded = store
        .get(&RelPath::new("a.txt").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(loaded.last_sync_time >= before);
}

#[tokio::test]
async fn put_is_an_upsert() {
    let store = setup().await;
    let path = RelPath::new("a.txt").unwrap();

    store.put(&state("a.txt", 1)).await.unwrap();
    let mut updated = state("a.txt", 2);
    updated.local_hash = None;
    store.put(&updated).await.unwrap();

    let loaded = store.get(&path).await.unwrap().unwrap();
    assert_eq!(loaded.file_size, 2);
    assert_eq!(loaded.local_hash, None);

    let all = store.list_all().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = setup().await;
    let path = RelPath::new("a.txt").unwrap();

    store.put(&state("a.txt", 1)).await.unwrap();
    store.delete(&path).await.unwrap();
    assert!(store.get(&path).await.unwrap().is_none());

    // Deleting an absent key is not an error.
    store.delete(&path).await.unwrap();
}

#[tokio::test]
async fn list_all_returns_every_row() {
    let store = setup().await;
    for (path, size) in [("a.txt", 1), ("docs/b.txt", 2), ("docs/deep/c.bin", 3)] {
        store.put(&state(path, size)).await.unwrap();
    }

    let all = store.list_all().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[&RelPath::new("docs/b.txt").unwrap()].file_size, 2);
}

#[tokio::test]
async fn hashes_may_be_absent() {
    // Index rebuild writes rows without hashes when the scan skipped them.
    let store = setup().await;
    let mut rebuilt = state("d.bin", 1024);
    rebuilt.local_hash = None;
    rebuilt.remote_hash = None;

    store.put(&rebuilt).await.unwrap();

    let loaded = store
        .get(&RelPath::new("d.bin").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.local_hash, None);
    assert_eq!(loaded.remote_hash, None);
}

#[tokio::test]
async fn corrupt_row_fails_the_whole_listing() {
    let pool = DatabasePool::in_memory().await.unwrap();
    let store = SqliteSnapshotStore::new(pool.pool().clone());

    store.put(&state("good.txt", 1)).await.unwrap();

    // Bypass the store to plant a row whose key is not a canonical
    // relative path.
    sqlx::query(
        "INSERT INTO snapshots (rel_path, file_size, mod_time, local_hash, remote_hash, last_sync_time) \
         VALUES ('/absolute/bad', 1, 0, NULL, NULL, 0)",
    )
    .execute(pool.pool())
    .await
    .unwrap();

    assert!(store.list_all().await.is_err());
}

#[tokio::test]
async fn file_backed_store_persists_across_pools() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.db");

    {
        let pool = DatabasePool::open(&db_path).await.unwrap();
        let store = SqliteSnapshotStore::new(pool.pool().clone());
        store.put(&state("persisted.txt", 7)).await.unwrap();
    }

    let pool = DatabasePool::open(&db_path).await.unwrap();
    let store = SqliteSnapshotStore::new(pool.pool().clone());
    let loaded = store
        .get(&RelPath::new("persisted.txt").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.file_size, 7);
}

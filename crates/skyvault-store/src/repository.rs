//! SQLite implementation of the SnapshotStore port
//!
//! Handles row mapping between the `snapshots` table and the domain
//! `FileState` record. Every write is a single statement, which gives the
//! atomicity and durability the port contract requires; SQLite serializes
//! writers, so concurrent upserts to distinct keys from the worker pool
//! are safe.
//!
//! A row that fails to decode poisons the whole `list_all` call on
//! purpose: the engine must abort the cycle rather than reconcile against
//! a partial base.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use skyvault_core::domain::meta::FileState;
use skyvault_core::domain::relpath::RelPath;
use skyvault_core::ports::SnapshotStore;

use crate::StoreError;

/// SQLite-backed implementation of the snapshot store port
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Creates a new store instance on the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Reconstructs a `FileState` from a database row
fn state_from_row(row: &SqliteRow) -> Result<FileState, StoreError> {
    let rel_path_str: String = row.get("rel_path");
    let file_size: i64 = row.get("file_size");
    let mod_time: i64 = row.get("mod_time");
    let local_hash: Option<String> = row.get("local_hash");
    let remote_hash: Option<String> = row.get("remote_hash");
    let last_sync_time: i64 = row.get("last_sync_time");

    let rel_path = RelPath::new(rel_path_str.clone()).map_err(|e| StoreError::Corrupt {
        key: rel_path_str.clone(),
        reason: e.to_string(),
    })?;

    if file_size < 0 {
        return Err(StoreError::Corrupt {
            key: rel_path_str,
            reason: format!("negative file_size {file_size}"),
        });
    }

    Ok(FileState {
        rel_path,
        file_size: file_size as u64,
        mod_time,
        local_hash,
        remote_hash,
        last_sync_time,
    })
}

#[async_trait::async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn get(&self, path: &RelPath) -> anyhow::Result<Option<FileState>> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE rel_path = ?")
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some(ref r) => Ok(Some(state_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, state: &FileState) -> anyhow::Result<()> {
        let last_sync_time = Utc::now().timestamp();

        sqlx::query(
            "INSERT OR REPLACE INTO snapshots \
             (rel_path, file_size, mod_time, local_hash, remote_hash, last_sync_time) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(state.rel_path.as_str())
        .bind(state.file_size as i64)
        .bind(state.mod_time)
        .bind(&state.local_hash)
        .bind(&state.remote_hash)
        .bind(last_sync_time)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        tracing::trace!(path = %state.rel_path, "snapshot row written");
        Ok(())
    }

    async fn delete(&self, path: &RelPath) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM snapshots WHERE rel_path = ?")
            .bind(path.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        tracing::trace!(path = %path, "snapshot row deleted");
        Ok(())
    }

    async fn list_all(&self) -> anyhow::Result<HashMap<RelPath, FileState>> {
        let rows = sqlx::query("SELECT * FROM snapshots")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let mut states = HashMap::with_capacity(rows.len());
        for row in &rows {
            let state = state_from_row(row)?;
            states.insert(state.rel_path.clone(), state);
        }

        Ok(states)
    }
}

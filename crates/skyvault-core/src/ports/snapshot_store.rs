//! Snapshot store port (driven/secondary port)
//!
//! Persistent map from [`RelPath`] to the [`FileState`] recorded at the
//! last successful synchronization of that path. The store is the
//! system's memory of "last synced"; the two file systems are
//! authoritative only about what currently exists.

use std::collections::HashMap;

use crate::domain::meta::FileState;
use crate::domain::relpath::RelPath;

/// Port trait for snapshot persistence.
///
/// ## Implementation Notes
///
/// - Each `put` and `delete` must be atomic and durable on return; a
///   partially written row must never be observable.
/// - `put` is an upsert and stamps `last_sync_time` with the current
///   time.
/// - Concurrent writes to distinct keys must be safe; writes to one key
///   are serialized by the engine (at most one task per path per cycle).
/// - If any row fails to decode, `list_all` must fail as a whole rather
///   than silently dropping state: the engine aborts the cycle instead of
///   acting on a partial base.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fetches the snapshot for one path, if present.
    async fn get(&self, path: &RelPath) -> anyhow::Result<Option<FileState>>;

    /// Inserts or replaces the snapshot for `state.rel_path`.
    async fn put(&self, state: &FileState) -> anyhow::Result<()>;

    /// Removes the snapshot for a path. Absent keys are not an error.
    async fn delete(&self, path: &RelPath) -> anyhow::Result<()>;

    /// Reads the entire snapshot table; called once per cycle.
    async fn list_all(&self) -> anyhow::Result<HashMap<RelPath, FileState>>;
}

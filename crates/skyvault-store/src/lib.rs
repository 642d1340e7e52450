//! skyvault-store - Snapshot persistence
//!
//! SQLite implementation of the `SnapshotStore` port: one table mapping
//! the canonical relative path to the file's state at its last successful
//! synchronization.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - connection pool with WAL mode and migration
//! - [`SqliteSnapshotStore`] - the port implementation
//! - [`StoreError`] - error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use skyvault_store::{DatabasePool, SqliteSnapshotStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::open(Path::new("/var/lib/skyvault/state.db")).await?;
//! let store = SqliteSnapshotStore::new(pool.pool().clone());
//! // Use store as a SnapshotStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteSnapshotStore;

/// Errors that can occur during snapshot store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded back into a snapshot record
    #[error("corrupt snapshot row for key '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

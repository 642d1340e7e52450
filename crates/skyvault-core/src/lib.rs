//! skyvault-core - Domain model and ports
//!
//! This crate is the hub of the workspace: it defines the domain types
//! shared by every adapter (relative paths, file metadata, snapshot
//! records, sync operations, conflict policies), the two port traits the
//! engine is written against, and the typed configuration file.
//!
//! Adapter crates (`skyvault-store`, `skyvault-remote`, `skyvault-sync`)
//! depend on this crate and never on each other.

pub mod config;
pub mod domain;
pub mod ports;

pub use config::Config;
pub use domain::conflict::ConflictPolicy;
pub use domain::meta::{FileMeta, FileState};
pub use domain::op::{SyncOp, Task};
pub use domain::relpath::RelPath;
pub use ports::{ByteStream, FileSystem, SnapshotStore};

//! skyvault-sync - The reconciliation engine
//!
//! This crate holds the parts of the system that decide and move bytes:
//!
//! - [`filesystem::LocalFileSystem`] - the local-disk side of the
//!   `FileSystem` port
//! - [`diff`] - the pure three-way decider mapping (local, remote, base)
//!   observations to an operation
//! - [`transfer::TransferPipeline`] - executes upload/download/delete
//!   with optional streaming encryption and integrity capture
//! - [`conflict`] - applies the configured policy when both sides changed
//! - [`rebuild`] - re-associates files after snapshot loss without
//!   transferring data
//! - [`engine::SyncEngine`] - orchestrates one cycle: concurrent scans,
//!   diff, bounded worker pool, completion barrier

pub mod conflict;
pub mod diff;
pub mod engine;
pub mod filesystem;
pub mod rebuild;
pub mod transfer;

pub use engine::{CycleReport, EngineOptions, SyncEngine};
pub use filesystem::LocalFileSystem;
pub use transfer::TransferPipeline;

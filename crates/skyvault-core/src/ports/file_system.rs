//! File system port (driven/secondary port)
//!
//! Uniform abstraction over "a tree of files", implemented once for the
//! local disk and once for the remote drive. Every method addresses
//! entries by [`RelPath`]; the adapter owns the mapping to absolute paths
//! (and, for the remote side, to encrypted path segments).
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because failures are adapter-specific (I/O
//!   errors locally, HTTP/API errors remotely) and the engine only
//!   aggregates them per task.
//! - Streams are plain `AsyncRead` objects so the transfer pipeline can
//!   interpose the content cipher without either adapter knowing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::domain::meta::FileMeta;
use crate::domain::relpath::RelPath;

/// A readable byte stream handed across the port boundary.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Port trait for one side of the synchronization.
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync {
    /// Root of this tree, for logging only.
    fn root(&self) -> &str;

    /// Recursively lists every entry under the root.
    ///
    /// Directories are included with `is_dir = true`. The local adapter
    /// omits hashes for speed; the remote adapter fills `remote_hash`
    /// from the drive API.
    async fn list_all(&self) -> anyhow::Result<HashMap<RelPath, FileMeta>>;

    /// Opens a read stream for a file. The caller drops it to close.
    async fn open_stream(&self, path: &RelPath) -> anyhow::Result<ByteStream>;

    /// Writes a full stream to `path`, creating parent directories.
    ///
    /// `mtime`, when given, is restored on the written file (best-effort;
    /// the local adapter warns on failure, the remote drive keeps its own
    /// server time). Returns the MD5 of what was written: the local
    /// adapter hashes the plaintext it put on disk, the remote adapter
    /// returns the hash the drive computed over the received bytes.
    async fn write_stream(
        &self,
        path: &RelPath,
        stream: ByteStream,
        mtime: Option<DateTime<Utc>>,
    ) -> anyhow::Result<String>;

    /// Removes a file, or a directory recursively. An absent path is an
    /// error.
    async fn delete(&self, path: &RelPath) -> anyhow::Result<()>;

    /// Returns metadata for a single entry. The local adapter also
    /// computes the content MD5 so snapshot updates are precise.
    async fn stat(&self, path: &RelPath) -> anyhow::Result<FileMeta>;

    /// Renames an entry. The remote drive only supports renaming within
    /// the same parent directory.
    async fn rename(&self, old: &RelPath, new: &RelPath) -> anyhow::Result<()>;
}

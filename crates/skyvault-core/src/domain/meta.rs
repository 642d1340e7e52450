//! File metadata and snapshot records
//!
//! Two views of a file exist in the system. [`FileMeta`] is the transient
//! result of scanning one side (local disk or the remote drive) and is
//! read-only once published. [`FileState`] is the persisted snapshot row
//! describing how a file looked the last time both sides were observed
//! consistent; the snapshot store is the only component that writes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::relpath::RelPath;

/// Metadata for a single entry produced by a scan.
///
/// The two hash fields are side-specific: the local scanner leaves both
/// empty for speed (a later `stat` fills `local_hash`), while the remote
/// scanner fills `remote_hash` from what the drive API reports. When
/// content encryption is active the remote hash covers the ciphertext, so
/// the two hashes are not comparable to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub rel_path: RelPath,
    /// Size in bytes as observed on that side (ciphertext size on the
    /// remote when encryption is on).
    pub size: u64,
    /// Modification time; the Unix epoch when the side does not supply one.
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
    /// MD5 of the plaintext, lowercase hex. `None` when the scan skipped
    /// hashing.
    pub local_hash: Option<String>,
    /// MD5 of the bytes as stored remotely, lowercase hex.
    pub remote_hash: Option<String>,
}

/// Persisted snapshot of a file at its last successful synchronization.
///
/// One row exists per synchronized path; `rel_path` is the primary key.
/// `file_size` and `mod_time` always describe the local plaintext file,
/// regardless of whether the remote copy is encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub rel_path: RelPath,
    /// Local plaintext size in bytes at last sync.
    pub file_size: u64,
    /// Local mtime at last sync, nanoseconds since the Unix epoch.
    pub mod_time: i64,
    /// MD5 of the local plaintext, lowercase hex.
    pub local_hash: Option<String>,
    /// MD5 of the remote bytes as the drive reported them. Differs from
    /// `local_hash` whenever content encryption is on.
    pub remote_hash: Option<String>,
    /// Seconds since the Unix epoch; stamped by the snapshot store on
    /// every write.
    pub last_sync_time: i64,
}

impl FileState {
    /// The recorded local mtime as a `DateTime`.
    pub fn mod_time_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.mod_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_time_round_trips_through_nanos() {
        let now = Utc::now();
        let state = FileState {
            rel_path: RelPath::new("a.txt").unwrap(),
            file_size: 10,
            mod_time: now.timestamp_nanos_opt().unwrap(),
            local_hash: None,
            remote_hash: None,
            last_sync_time: 0,
        };
        assert_eq!(state.mod_time_utc(), now);
    }
}

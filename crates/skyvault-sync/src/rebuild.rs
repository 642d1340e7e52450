//! Index rebuild after snapshot loss
//!
//! When the snapshot database is gone but a path exists on both sides
//! with sizes that agree (modulo the cipher header), re-transferring the
//! file would be slow and destructive. Instead the driver writes a fresh
//! snapshot row derived from the local scan, re-associating the pair
//! without moving a byte. The association is deliberately weak: if the
//! scan carried no hash the row stores none, and later cycles upgrade or
//! refute it through normal hash comparison.

use skyvault_core::domain::meta::{FileMeta, FileState};

/// Builds the snapshot row that re-associates a fuzzy-matched pair.
///
/// Both hash columns take the local hash: the rebuild only happens when
/// the two sides are assumed to hold the same content. The store stamps
/// `last_sync_time` on write.
pub fn rebuilt_state(local: &FileMeta) -> FileState {
    FileState {
        rel_path: local.rel_path.clone(),
        file_size: local.size,
        mod_time: local.mod_time.timestamp_nanos_opt().unwrap_or_default(),
        local_hash: local.local_hash.clone(),
        remote_hash: local.local_hash.clone(),
        last_sync_time: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skyvault_core::domain::relpath::RelPath;

    #[test]
    fn rebuilt_state_takes_local_size_time_and_hash() {
        let mod_time = Utc.timestamp_opt(1_700_000_000, 500).unwrap();
        let meta = FileMeta {
            rel_path: RelPath::new("d.bin").unwrap(),
            size: 1024,
            mod_time,
            is_dir: false,
            local_hash: Some("abcd".to_string()),
            remote_hash: Some("ignored".to_string()),
        };

        let state = rebuilt_state(&meta);
        assert_eq!(state.rel_path.as_str(), "d.bin");
        assert_eq!(state.file_size, 1024);
        assert_eq!(state.mod_time, mod_time.timestamp_nanos_opt().unwrap());
        assert_eq!(state.local_hash.as_deref(), Some("abcd"));
        // The remote hash is assumed equal to the local one.
        assert_eq!(state.remote_hash.as_deref(), Some("abcd"));
    }

    #[test]
    fn rebuilt_state_without_scan_hash_stores_none() {
        let meta = FileMeta {
            rel_path: RelPath::new("d.bin").unwrap(),
            size: 1024,
            mod_time: Utc::now(),
            is_dir: false,
            local_hash: None,
            remote_hash: None,
        };

        let state = rebuilt_state(&meta);
        assert_eq!(state.local_hash, None);
        assert_eq!(state.remote_hash, None);
    }
}

//! Three-way diff decider
//!
//! [`compare`] is a pure function from the three observations of one path
//! (local scan, remote scan, snapshot) to the operation that reconciles
//! them. It performs no I/O and never blocks, which keeps every rule
//! testable by enumerating triples.
//!
//! The snapshot ("base") is what breaks the symmetry: a file present on
//! only one side is *new* when the base is absent but *deleted on the
//! other side* when the base is present. When content encryption is on,
//! the remote size of a synced file exceeds the recorded plaintext size
//! by exactly the cipher's IV header, and every remote size comparison
//! accounts for that.

use chrono::Duration;

use skyvault_core::domain::meta::{FileMeta, FileState};
use skyvault_core::domain::op::SyncOp;
use skyvault_crypto::ENCRYPTED_OVERHEAD;

/// Allowed mtime drift when falling back to size + time comparison.
/// Filesystems round mtimes differently (FAT stores two-second
/// granularity), so exact equality would re-upload unchanged files.
const MTIME_TOLERANCE_MS: i64 = 2_000;

/// Decides the operation for one path.
pub fn compare(
    local: Option<&FileMeta>,
    remote: Option<&FileMeta>,
    base: Option<&FileState>,
    encrypted: bool,
) -> SyncOp {
    // Directories carry no content; creation and deletion are implied by
    // the files inside them.
    if local.is_some_and(|l| l.is_dir) || remote.is_some_and(|r| r.is_dir) {
        return SyncOp::Ignore;
    }

    // No base: the snapshot never saw this path (first run, new file, or
    // snapshot loss).
    let Some(base) = base else {
        return match (local, remote) {
            (Some(_), None) => SyncOp::Upload,
            (None, Some(_)) => SyncOp::Download,
            (Some(l), Some(r)) => {
                if fuzzy_size_match(l, r, encrypted) {
                    // The driver re-associates the pair without moving
                    // bytes; see the rebuild module.
                    SyncOp::Ignore
                } else {
                    SyncOp::Conflict
                }
            }
            (None, None) => SyncOp::Ignore,
        };
    };

    // Local side vanished since the last sync.
    let Some(local) = local else {
        return match remote {
            None => SyncOp::Ignore,
            Some(r) if remote_matches_base(r, base, encrypted) => SyncOp::DeleteRemote,
            Some(_) => SyncOp::Download,
        };
    };

    // Remote side vanished since the last sync.
    let Some(remote) = remote else {
        return if local_matches_base(local, base) {
            SyncOp::DeleteLocal
        } else {
            SyncOp::Upload
        };
    };

    // Both sides present: classify each against the base.
    let local_changed = !local_matches_base(local, base);
    let remote_changed = !remote_matches_base(remote, base, encrypted);

    match (local_changed, remote_changed) {
        (false, false) => SyncOp::Ignore,
        (true, false) => SyncOp::Upload,
        (false, true) => SyncOp::Download,
        (true, true) => SyncOp::Conflict,
    }
}

/// Size-only re-association check used when the snapshot is gone.
///
/// A weak heuristic on purpose: it only has to be good enough to avoid
/// re-transferring an entire tree after snapshot loss. Later cycles
/// compare hashes and catch any real divergence. Remote mtimes are not
/// consulted; the drive does not preserve client times.
fn fuzzy_size_match(local: &FileMeta, remote: &FileMeta, encrypted: bool) -> bool {
    let expected_remote_size = if encrypted {
        local.size + ENCRYPTED_OVERHEAD
    } else {
        local.size
    };
    remote.size == expected_remote_size
}

/// Whether the local file still looks like it did at the last sync.
fn local_matches_base(local: &FileMeta, base: &FileState) -> bool {
    // Hashes win when both sides have one.
    if let (Some(local_hash), Some(base_hash)) = (&local.local_hash, &base.local_hash) {
        return local_hash == base_hash;
    }
    if local.size != base.file_size {
        return false;
    }
    let drift = local.mod_time - base.mod_time_utc();
    drift.abs() < Duration::milliseconds(MTIME_TOLERANCE_MS)
}

/// Whether the remote file still looks like it did at the last sync.
///
/// The base records the *plaintext* size, so the expected remote size
/// grows by the cipher header when encryption is on. Remote mtimes are
/// never compared.
fn remote_matches_base(remote: &FileMeta, base: &FileState, encrypted: bool) -> bool {
    if let (Some(remote_hash), Some(base_hash)) = (&remote.remote_hash, &base.remote_hash) {
        return remote_hash == base_hash;
    }
    let expected_size = if encrypted {
        base.file_size + ENCRYPTED_OVERHEAD
    } else {
        base.file_size
    };
    remote.size == expected_size
}

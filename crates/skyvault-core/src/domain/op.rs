//! Synchronization operations and tasks

use std::fmt::{self, Display, Formatter};

use super::relpath::RelPath;

/// The operation the diff decider selects for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    /// Both sides already agree (or the entry is a directory).
    Ignore,
    /// Local content replaces the remote copy.
    Upload,
    /// Remote content replaces the local copy.
    Download,
    /// Propagate a local deletion to the remote.
    DeleteRemote,
    /// Propagate a remote deletion to the local tree.
    DeleteLocal,
    /// Both sides changed independently; the conflict policy decides.
    Conflict,
}

impl Display for SyncOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncOp::Ignore => "ignore",
            SyncOp::Upload => "upload",
            SyncOp::Download => "download",
            SyncOp::DeleteRemote => "delete-remote",
            SyncOp::DeleteLocal => "delete-local",
            SyncOp::Conflict => "conflict",
        };
        write!(f, "{name}")
    }
}

/// One unit of work dispatched to the transfer workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub op: SyncOp,
    pub rel_path: RelPath,
}

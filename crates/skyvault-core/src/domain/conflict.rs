//! Conflict resolution policies
//!
//! When the decider reports that both sides changed independently, the
//! configured [`ConflictPolicy`] chooses what happens. Configuration names
//! describe the visible effect (`delete_remote` discards the remote copy),
//! while the variants describe the operation the engine performs.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// How a two-sided modification is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Rename the local file with a `.local` suffix, then download the
    /// remote version to the original path.
    #[default]
    RenameLocal,
    /// Rename the remote file with a `.remote` suffix, then upload the
    /// local version.
    RenameRemote,
    /// Keep whichever side has the newer modification time.
    KeepNewest,
    /// Delete the remote copy, then upload the local version.
    ForceUpload,
    /// Delete the local copy, then download the remote version.
    ForceDownload,
}

impl ConflictPolicy {
    /// The configuration spelling of this policy.
    pub fn config_name(&self) -> &'static str {
        match self {
            ConflictPolicy::RenameLocal => "rename_local",
            ConflictPolicy::RenameRemote => "rename_remote",
            ConflictPolicy::KeepNewest => "keep_latest",
            ConflictPolicy::ForceUpload => "delete_remote",
            ConflictPolicy::ForceDownload => "delete_local",
        }
    }
}

impl Display for ConflictPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_name())
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rename_local" => Ok(ConflictPolicy::RenameLocal),
            "rename_remote" => Ok(ConflictPolicy::RenameRemote),
            "keep_latest" => Ok(ConflictPolicy::KeepNewest),
            "delete_remote" => Ok(ConflictPolicy::ForceUpload),
            "delete_local" => Ok(ConflictPolicy::ForceDownload),
            other => Err(format!(
                "unknown conflict strategy '{other}'; valid: rename_local, \
                 rename_remote, keep_latest, delete_remote, delete_local"
            )),
        }
    }
}

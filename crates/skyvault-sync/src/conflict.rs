//! Conflict resolution
//!
//! Applies the configured [`ConflictPolicy`] when the decider reports
//! that both sides changed independently. Every policy reduces the
//! conflict to a plain upload or download after one preparatory step;
//! if that first step fails the task aborts with its error and nothing
//! is rolled back - the next cycle sees whatever state was reached.

use anyhow::Context;
use tracing::info;

use skyvault_core::domain::conflict::ConflictPolicy;
use skyvault_core::domain::relpath::RelPath;

use crate::transfer::TransferPipeline;

/// Suffix given to the preserved local copy under `RenameLocal`.
const LOCAL_SUFFIX: &str = ".local";

/// Suffix given to the preserved remote copy under `RenameRemote`.
const REMOTE_SUFFIX: &str = ".remote";

impl TransferPipeline {
    /// Resolves a two-sided modification of `path` per the configured
    /// policy.
    pub(crate) async fn resolve_conflict(&self, path: &RelPath) -> anyhow::Result<()> {
        info!(path = %path, policy = %self.policy, "resolving conflict");

        match self.policy {
            ConflictPolicy::RenameLocal => {
                let preserved = path.with_suffix(LOCAL_SUFFIX);
                info!(path = %path, preserved = %preserved, "preserving local copy");
                self.local()
                    .rename(path, &preserved)
                    .await
                    .context("rename local file aside")?;
                self.download(path).await
            }
            ConflictPolicy::RenameRemote => {
                let preserved = path.with_suffix(REMOTE_SUFFIX);
                info!(path = %path, preserved = %preserved, "preserving remote copy");
                self.remote()
                    .rename(path, &preserved)
                    .await
                    .context("rename remote file aside")?;
                self.upload(path).await
            }
            ConflictPolicy::KeepNewest => {
                let local_meta = self
                    .local()
                    .stat(path)
                    .await
                    .context("stat local for newest-wins")?;
                let remote_meta = self
                    .remote()
                    .stat(path)
                    .await
                    .context("stat remote for newest-wins")?;

                info!(
                    path = %path,
                    local_mtime = %local_meta.mod_time,
                    remote_mtime = %remote_meta.mod_time,
                    "comparing modification times"
                );

                if local_meta.mod_time > remote_meta.mod_time {
                    self.upload(path).await
                } else {
                    self.download(path).await
                }
            }
            ConflictPolicy::ForceUpload => {
                // Delete first: overwrite semantics vary between drives,
                // a fresh upload does not.
                self.remote()
                    .delete(path)
                    .await
                    .context("delete remote before forced upload")?;
                self.upload(path).await
            }
            ConflictPolicy::ForceDownload => {
                self.local()
                    .delete(path)
                    .await
                    .context("delete local before forced download")?;
                self.download(path).await
            }
        }
    }
}

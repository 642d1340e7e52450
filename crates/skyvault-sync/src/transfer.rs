//! Transfer pipeline
//!
//! Executes the operations the decider emits. Each call is stateless:
//! open the source stream, interpose the content cipher when configured,
//! move the bytes, then record the observed outcome in the snapshot
//! store. The snapshot is only written after the whole transfer
//! succeeded, which is what makes the engine eventually consistent under
//! transient failures - a failed task leaves the divergence in place for
//! the next cycle to retry.
//!
//! Uploads also verify integrity: the bytes handed to the remote are
//! hashed while streaming, and a mismatch with the drive-reported hash
//! fails the task before the snapshot is touched.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context as TaskContext, Poll};

use anyhow::{bail, Context};
use chrono::DateTime;
use md5::{Digest, Md5};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::{debug, info};

use skyvault_core::domain::conflict::ConflictPolicy;
use skyvault_core::domain::meta::FileState;
use skyvault_core::domain::op::{SyncOp, Task};
use skyvault_core::domain::relpath::RelPath;
use skyvault_core::ports::{ByteStream, FileSystem, SnapshotStore};
use skyvault_crypto::{DecryptReader, EncryptReader};

/// Executes sync tasks against the two file systems and the snapshot
/// store.
pub struct TransferPipeline {
    local: Arc<dyn FileSystem>,
    remote: Arc<dyn FileSystem>,
    store: Arc<dyn SnapshotStore>,
    encrypt_key: Option<[u8; 32]>,
    pub(crate) policy: ConflictPolicy,
}

impl TransferPipeline {
    pub fn new(
        local: Arc<dyn FileSystem>,
        remote: Arc<dyn FileSystem>,
        store: Arc<dyn SnapshotStore>,
        encrypt_key: Option<[u8; 32]>,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            local,
            remote,
            store,
            encrypt_key,
            policy,
        }
    }

    pub(crate) fn local(&self) -> &Arc<dyn FileSystem> {
        &self.local
    }

    pub(crate) fn remote(&self) -> &Arc<dyn FileSystem> {
        &self.remote
    }

    /// Runs one task end to end.
    pub async fn execute(&self, task: &Task) -> anyhow::Result<()> {
        match task.op {
            SyncOp::Ignore => Ok(()),
            SyncOp::Upload => self.upload(&task.rel_path).await,
            SyncOp::Download => self.download(&task.rel_path).await,
            SyncOp::DeleteRemote => self.delete_remote(&task.rel_path).await,
            SyncOp::DeleteLocal => self.delete_local(&task.rel_path).await,
            SyncOp::Conflict => self.resolve_conflict(&task.rel_path).await,
        }
    }

    /// Local -> remote, optionally encrypting in flight.
    pub(crate) async fn upload(&self, path: &RelPath) -> anyhow::Result<()> {
        info!(path = %path, "uploading");

        let reader = self
            .local
            .open_stream(path)
            .await
            .context("open local stream")?;
        let outbound: ByteStream = match &self.encrypt_key {
            Some(key) => Box::new(EncryptReader::new(reader, key)),
            None => reader,
        };

        // Hash exactly the bytes the drive receives so the reported hash
        // can be checked.
        let (outbound, sent_digest) = HashingReader::wrap(outbound);

        let remote_hash = self
            .remote
            .write_stream(path, Box::new(outbound), None)
            .await
            .context("write remote stream")?;

        match sent_digest.lock().ok().and_then(|d| d.clone()) {
            Some(sent) if sent != remote_hash => {
                bail!(
                    "integrity check failed for '{path}': sent {sent}, drive reported {remote_hash}"
                );
            }
            Some(_) => {}
            None => debug!(path = %path, "upload stream was not fully drained; skipping hash check"),
        }

        // Re-stat rather than reusing scan output: the file may have
        // changed during the upload, and the snapshot must describe the
        // bytes that actually went out.
        let stat = self
            .local
            .stat(path)
            .await
            .context("stat local after upload")?;

        let state = FileState {
            rel_path: path.clone(),
            file_size: stat.size,
            mod_time: stat.mod_time.timestamp_nanos_opt().unwrap_or_default(),
            local_hash: stat.local_hash,
            remote_hash: Some(remote_hash),
            last_sync_time: 0,
        };
        debug!(
            path = %path,
            local_hash = state.local_hash.as_deref().unwrap_or(""),
            remote_hash = state.remote_hash.as_deref().unwrap_or(""),
            "recording upload in snapshot"
        );
        self.store
            .put(&state)
            .await
            .context("record upload in snapshot")
    }

    /// Remote -> local, optionally decrypting in flight.
    pub(crate) async fn download(&self, path: &RelPath) -> anyhow::Result<()> {
        info!(path = %path, "downloading");

        let reader = self
            .remote
            .open_stream(path)
            .await
            .context("open remote stream")?;
        let inbound: ByteStream = match &self.encrypt_key {
            Some(key) => Box::new(DecryptReader::new(reader, key)),
            None => reader,
        };

        // Remote metadata supplies the hash to record and the mtime to
        // restore locally.
        let remote_meta = self.remote.stat(path).await.context("stat remote")?;
        let mtime = (remote_meta.mod_time != DateTime::UNIX_EPOCH).then_some(remote_meta.mod_time);

        let local_hash = self
            .local
            .write_stream(path, inbound, mtime)
            .await
            .context("write local stream")?;

        let stat = self
            .local
            .stat(path)
            .await
            .context("stat local after download")?;

        let state = FileState {
            rel_path: path.clone(),
            file_size: stat.size,
            mod_time: stat.mod_time.timestamp_nanos_opt().unwrap_or_default(),
            local_hash: Some(local_hash),
            remote_hash: remote_meta.remote_hash,
            last_sync_time: 0,
        };
        debug!(
            path = %path,
            local_hash = state.local_hash.as_deref().unwrap_or(""),
            remote_hash = state.remote_hash.as_deref().unwrap_or(""),
            "recording download in snapshot"
        );
        self.store
            .put(&state)
            .await
            .context("record download in snapshot")
    }

    /// Propagates a local deletion. The snapshot row goes only after the
    /// remote delete succeeded, so a failure keeps the path tracked.
    pub(crate) async fn delete_remote(&self, path: &RelPath) -> anyhow::Result<()> {
        info!(path = %path, "deleting remote copy");
        self.remote
            .delete(path)
            .await
            .context("delete remote file")?;
        self.store
            .delete(path)
            .await
            .context("drop snapshot entry after remote delete")
    }

    /// Propagates a remote deletion; same ordering rule as
    /// [`delete_remote`](Self::delete_remote).
    pub(crate) async fn delete_local(&self, path: &RelPath) -> anyhow::Result<()> {
        info!(path = %path, "deleting local copy");
        self.local.delete(path).await.context("delete local file")?;
        self.store
            .delete(path)
            .await
            .context("drop snapshot entry after local delete")
    }
}

// ============================================================================
// Stream hashing
// ============================================================================

/// Shared slot the digest lands in once the wrapped stream hits EOF.
type DigestSlot = Arc<Mutex<Option<String>>>;

/// Hashes bytes as they flow through, publishing the final MD5 when the
/// consumer drains the stream to EOF.
struct HashingReader<R> {
    inner: R,
    hasher: Option<Md5>,
    digest: DigestSlot,
}

impl<R> HashingReader<R> {
    fn wrap(inner: R) -> (Self, DigestSlot) {
        let digest: DigestSlot = Arc::new(Mutex::new(None));
        (
            Self {
                inner,
                hasher: Some(Md5::new()),
                digest: digest.clone(),
            },
            digest,
        )
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let me = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut me.inner).poll_read(cx, buf))?;
        let chunk = &buf.filled()[before..];

        if chunk.is_empty() {
            if let Some(hasher) = me.hasher.take() {
                if let Ok(mut slot) = me.digest.lock() {
                    *slot = Some(format!("{:x}", hasher.finalize()));
                }
            }
        } else if let Some(hasher) = &mut me.hasher {
            hasher.update(chunk);
        }

        Poll::Ready(Ok(()))
    }
}

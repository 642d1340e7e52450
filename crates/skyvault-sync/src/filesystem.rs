//! Local file system adapter (driven/secondary adapter)
//!
//! Implements the `FileSystem` port over `tokio::fs`, rooted at the
//! configured local directory.
//!
//! ## Design Decisions
//!
//! - **Scan speed over precision**: `list_all` never hashes; content
//!   hashes are only computed by `stat`, which the transfer pipeline
//!   calls once per completed transfer.
//! - **Atomic writes**: `write_stream` goes through a temp file in the
//!   target directory plus a rename, so a crash mid-transfer never
//!   leaves a half-written file at the target path.
//! - **mtime restoration**: downloads carry the remote's time back onto
//!   the local file so the mtime-based comparison stays meaningful;
//!   failure to set it only warns.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::Context;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use md5::{Digest, Md5};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use skyvault_core::domain::meta::FileMeta;
use skyvault_core::domain::relpath::RelPath;
use skyvault_core::ports::{ByteStream, FileSystem};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// `FileSystem` implementation for the local directory tree.
pub struct LocalFileSystem {
    root: PathBuf,
    root_display: String,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root_display = root.display().to_string();
        Self { root, root_display }
    }

    fn sys_path(&self, rel: &RelPath) -> PathBuf {
        self.root.join(rel.as_str())
    }

    /// Converts an absolute path under the root back to a canonical
    /// relative path.
    fn rel_from(&self, path: &Path) -> anyhow::Result<RelPath> {
        let rel = path
            .strip_prefix(&self.root)
            .with_context(|| format!("path {} escapes root {}", path.display(), self.root_display))?;

        let mut parts = Vec::new();
        for component in rel.components() {
            let part = component
                .as_os_str()
                .to_str()
                .with_context(|| format!("non-UTF-8 path component in {}", path.display()))?;
            parts.push(part);
        }
        RelPath::new(parts.join("/")).map_err(Into::into)
    }

    async fn md5_of(path: &Path) -> anyhow::Result<String> {
        let mut file = fs::File::open(path)
            .await
            .with_context(|| format!("open {} for hashing", path.display()))?;
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn meta_from(&self, rel: RelPath, metadata: &std::fs::Metadata) -> FileMeta {
        let mod_time = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        FileMeta {
            rel_path: rel,
            size: metadata.len(),
            mod_time,
            is_dir: metadata.is_dir(),
            local_hash: None,
            remote_hash: None,
        }
    }

    fn walk<'a>(
        &'a self,
        dir: PathBuf,
        out: &'a mut HashMap<RelPath, FileMeta>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = fs::read_dir(&dir)
                .await
                .with_context(|| format!("read directory {}", dir.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .with_context(|| format!("stat {}", path.display()))?;
                let rel = self.rel_from(&path)?;

                out.insert(rel.clone(), self.meta_from(rel, &metadata));

                if metadata.is_dir() {
                    self.walk(path, out).await?;
                }
            }

            Ok(())
        })
    }
}

#[async_trait::async_trait]
impl FileSystem for LocalFileSystem {
    fn root(&self) -> &str {
        &self.root_display
    }

    async fn list_all(&self) -> anyhow::Result<HashMap<RelPath, FileMeta>> {
        let mut out = HashMap::new();
        self.walk(self.root.clone(), &mut out).await?;
        debug!(root = %self.root_display, entries = out.len(), "local scan complete");
        Ok(out)
    }

    async fn open_stream(&self, path: &RelPath) -> anyhow::Result<ByteStream> {
        let file = fs::File::open(self.sys_path(path))
            .await
            .with_context(|| format!("open local file '{path}'"))?;
        Ok(Box::new(file))
    }

    async fn write_stream(
        &self,
        path: &RelPath,
        mut stream: ByteStream,
        mtime: Option<DateTime<Utc>>,
    ) -> anyhow::Result<String> {
        let target = self.sys_path(path);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create parent directories for '{path}'"))?;
        }

        // Stream into a temp file next to the target so the final rename
        // is atomic on the same filesystem.
        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".part");
            PathBuf::from(p)
        };

        let mut file = fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("create temp file for '{path}'"))?;

        let mut hasher = Md5::new();
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        loop {
            let n = stream
                .read(&mut buf)
                .await
                .with_context(|| format!("read transfer stream for '{path}'"))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n])
                .await
                .with_context(|| format!("write '{path}'"))?;
        }
        file.flush().await?;
        drop(file);

        fs::rename(&tmp_path, &target)
            .await
            .with_context(|| format!("move temp file into place for '{path}'"))?;

        if let Some(mtime) = mtime {
            let ft = FileTime::from_unix_time(mtime.timestamp(), mtime.timestamp_subsec_nanos());
            if let Err(err) = filetime::set_file_mtime(&target, ft) {
                warn!(path = %path, error = %err, "could not restore modification time");
            }
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    async fn delete(&self, path: &RelPath) -> anyhow::Result<()> {
        let target = self.sys_path(path);
        let metadata = fs::metadata(&target)
            .await
            .with_context(|| format!("delete local '{path}'"))?;

        if metadata.is_dir() {
            fs::remove_dir_all(&target)
                .await
                .with_context(|| format!("remove local directory '{path}'"))?;
        } else {
            fs::remove_file(&target)
                .await
                .with_context(|| format!("remove local file '{path}'"))?;
        }
        Ok(())
    }

    async fn stat(&self, path: &RelPath) -> anyhow::Result<FileMeta> {
        let target = self.sys_path(path);
        let metadata = fs::metadata(&target)
            .await
            .with_context(|| format!("stat local '{path}'"))?;

        let mut meta = self.meta_from(path.clone(), &metadata);
        if !metadata.is_dir() {
            meta.local_hash = Some(Self::md5_of(&target).await?);
        }
        Ok(meta)
    }

    async fn rename(&self, old: &RelPath, new: &RelPath) -> anyhow::Result<()> {
        let new_sys = self.sys_path(new);
        if let Some(parent) = new_sys.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create parent directories for '{new}'"))?;
        }
        fs::rename(self.sys_path(old), new_sys)
            .await
            .with_context(|| format!("rename local '{old}' -> '{new}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn rel(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[tokio::test]
    async fn write_then_stat_round_trips_content_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let fs_local = LocalFileSystem::new(dir.path());

        let written = fs_local
            .write_stream(
                &rel("docs/a.txt"),
                Box::new(Cursor::new(b"hello".to_vec())),
                None,
            )
            .await
            .unwrap();
        // MD5("hello")
        assert_eq!(written, "5d41402abc4b2a76b9719d911017c592");

        let meta = fs_local.stat(&rel("docs/a.txt")).await.unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.local_hash.as_deref(), Some(written.as_str()));
        assert!(!meta.is_dir);
    }

    #[tokio::test]
    async fn write_restores_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let fs_local = LocalFileSystem::new(dir.path());
        let wanted = DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap();

        fs_local
            .write_stream(
                &rel("a.txt"),
                Box::new(Cursor::new(b"x".to_vec())),
                Some(wanted),
            )
            .await
            .unwrap();

        let meta = fs_local.stat(&rel("a.txt")).await.unwrap();
        assert_eq!(meta.mod_time, wanted);
    }

    #[tokio::test]
    async fn list_all_skips_hashing_and_includes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let fs_local = LocalFileSystem::new(dir.path());

        fs_local
            .write_stream(&rel("top.txt"), Box::new(Cursor::new(b"1".to_vec())), None)
            .await
            .unwrap();
        fs_local
            .write_stream(
                &rel("sub/nested.txt"),
                Box::new(Cursor::new(b"22".to_vec())),
                None,
            )
            .await
            .unwrap();

        let listing = fs_local.list_all().await.unwrap();
        assert_eq!(listing.len(), 3);
        assert!(listing[&rel("sub")].is_dir);
        assert_eq!(listing[&rel("sub/nested.txt")].size, 2);
        assert_eq!(listing[&rel("sub/nested.txt")].local_hash, None);
    }

    #[tokio::test]
    async fn delete_requires_existence_and_removes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let fs_local = LocalFileSystem::new(dir.path());

        assert!(fs_local.delete(&rel("missing.txt")).await.is_err());

        fs_local
            .write_stream(
                &rel("sub/nested.txt"),
                Box::new(Cursor::new(b"x".to_vec())),
                None,
            )
            .await
            .unwrap();
        fs_local.delete(&rel("sub")).await.unwrap();
        assert!(fs_local.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_moves_within_and_across_directories() {
        let dir = tempfile::tempdir().unwrap();
        let fs_local = LocalFileSystem::new(dir.path());

        fs_local
            .write_stream(&rel("a.txt"), Box::new(Cursor::new(b"x".to_vec())), None)
            .await
            .unwrap();
        fs_local.rename(&rel("a.txt"), &rel("b/c.txt")).await.unwrap();

        let listing = fs_local.list_all().await.unwrap();
        assert!(listing.contains_key(&rel("b/c.txt")));
        assert!(!listing.contains_key(&rel("a.txt")));
    }
}

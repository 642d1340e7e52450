//! Remote file system adapter (driven/secondary adapter)
//!
//! Implements the `FileSystem` port on top of [`DriveClient`]. The
//! adapter owns two responsibilities beyond plain delegation:
//!
//! - **Path mapping**: canonical relative paths are joined under the
//!   configured remote root to form the absolute paths the API expects.
//! - **Filename encryption**: when enabled, every path segment is
//!   encrypted on the way out and decrypted on the way back. Listing is
//!   lenient about segments that fail to decrypt (pre-existing plaintext
//!   entries are surfaced under their raw names); everything else is
//!   strict.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use tracing::debug;

use skyvault_core::domain::meta::FileMeta;
use skyvault_core::domain::relpath::RelPath;
use skyvault_core::ports::{ByteStream, FileSystem};
use skyvault_crypto::{decrypt_name, encrypt_name};

use crate::client::{DriveClient, RemoteEntry};

/// `FileSystem` implementation backed by the remote drive.
pub struct RemoteFileSystem {
    client: Arc<DriveClient>,
    /// Absolute remote root, normalized to start with `/` and not end
    /// with one.
    root: String,
    /// Key for the filename transform; `None` leaves names in plaintext.
    name_key: Option<[u8; 32]>,
}

impl RemoteFileSystem {
    pub fn new(client: Arc<DriveClient>, remote_dir: &str, name_key: Option<[u8; 32]>) -> Self {
        let trimmed = remote_dir.trim_end_matches('/');
        let root = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        Self {
            client,
            root,
            name_key,
        }
    }

    /// Maps a plain relative path to the absolute (and possibly
    /// encrypted) path the API expects. An empty `rel` addresses the
    /// root itself.
    fn to_abs(&self, rel: &str) -> anyhow::Result<String> {
        if rel.is_empty() {
            return Ok(self.root.clone());
        }
        let wire_rel = match &self.name_key {
            None => rel.to_string(),
            Some(key) => {
                let mut parts = Vec::new();
                for segment in rel.split('/') {
                    parts.push(
                        encrypt_name(segment, key)
                            .with_context(|| format!("encrypt path segment of '{rel}'"))?,
                    );
                }
                parts.join("/")
            }
        };
        Ok(format!("{}/{}", self.root, wire_rel))
    }

    /// Recovers the plain name for a server-side entry name. Entries
    /// that were never encrypted keep their raw name.
    fn plain_name(&self, server_name: &str) -> String {
        match &self.name_key {
            None => server_name.to_string(),
            Some(key) => match decrypt_name(server_name, key) {
                Ok(name) => name,
                Err(err) => {
                    debug!(
                        name = server_name,
                        %err,
                        "remote name did not decrypt; treating as plaintext"
                    );
                    server_name.to_string()
                }
            },
        }
    }

    fn entry_to_meta(&self, rel_path: RelPath, entry: &RemoteEntry) -> FileMeta {
        // server_mtime of zero means the drive did not report one; keep
        // the epoch sentinel, the diff never compares remote mtimes.
        let mod_time = DateTime::<Utc>::from_timestamp(entry.server_mtime, 0)
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);
        FileMeta {
            rel_path,
            size: entry.size,
            mod_time,
            is_dir: entry.is_dir,
            local_hash: None,
            remote_hash: entry.md5.clone(),
        }
    }
}

#[async_trait::async_trait]
impl FileSystem for RemoteFileSystem {
    fn root(&self) -> &str {
        &self.root
    }

    async fn list_all(&self) -> anyhow::Result<HashMap<RelPath, FileMeta>> {
        let mut entries = HashMap::new();
        // Breadth-first over plain relative directory paths; "" is the
        // remote root.
        let mut queue: VecDeque<String> = VecDeque::from([String::new()]);

        while let Some(dir_rel) = queue.pop_front() {
            let abs = self
                .to_abs(&dir_rel)
                .with_context(|| format!("map remote directory '{dir_rel}'"))?;
            let listing = self
                .client
                .list_dir(&abs)
                .await
                .with_context(|| format!("list remote directory '{abs}'"))?;

            for entry in &listing {
                let name = self.plain_name(&entry.server_filename);
                let rel = if dir_rel.is_empty() {
                    RelPath::new(name.as_str())
                } else {
                    RelPath::new(format!("{dir_rel}/{name}"))
                }
                .with_context(|| format!("remote entry '{name}' in '{dir_rel}'"))?;

                if entry.is_dir {
                    queue.push_back(rel.as_str().to_string());
                }
                entries.insert(rel.clone(), self.entry_to_meta(rel, entry));
            }
        }

        Ok(entries)
    }

    async fn open_stream(&self, path: &RelPath) -> anyhow::Result<ByteStream> {
        let abs = self.to_abs(path.as_str())?;
        let stream = self
            .client
            .download(&abs)
            .await
            .with_context(|| format!("open remote stream for '{path}'"))?;
        Ok(stream)
    }

    async fn write_stream(
        &self,
        path: &RelPath,
        stream: ByteStream,
        _mtime: Option<DateTime<Utc>>,
    ) -> anyhow::Result<String> {
        // The drive keeps its own server time; client mtimes are not
        // preserved.
        let abs = self.to_abs(path.as_str())?;
        let md5 = self
            .client
            .upload(&abs, stream)
            .await
            .with_context(|| format!("upload '{path}'"))?;
        Ok(md5)
    }

    async fn delete(&self, path: &RelPath) -> anyhow::Result<()> {
        let abs = self.to_abs(path.as_str())?;
        self.client
            .delete(&abs)
            .await
            .with_context(|| format!("delete remote '{path}'"))?;
        Ok(())
    }

    async fn stat(&self, path: &RelPath) -> anyhow::Result<FileMeta> {
        // The drive has no single-entry metadata call; list the parent
        // and pick the entry out by its decrypted name.
        let parent_rel = path.parent().map(|p| p.as_str().to_string()).unwrap_or_default();
        let abs_parent = self.to_abs(&parent_rel)?;
        let listing = self
            .client
            .list_dir(&abs_parent)
            .await
            .with_context(|| format!("stat remote '{path}'"))?;

        for entry in &listing {
            if self.plain_name(&entry.server_filename) == path.file_name() {
                return Ok(self.entry_to_meta(path.clone(), entry));
            }
        }

        bail!("remote file not found: {path}");
    }

    async fn rename(&self, old: &RelPath, new: &RelPath) -> anyhow::Result<()> {
        if old.parent() != new.parent() {
            bail!(
                "remote rename is in-place only (old '{old}' and new '{new}' \
                 have different parents)"
            );
        }

        let abs_old = self.to_abs(old.as_str())?;
        let new_name = match &self.name_key {
            None => new.file_name().to_string(),
            Some(key) => encrypt_name(new.file_name(), key)
                .with_context(|| format!("encrypt new name for '{new}'"))?,
        };

        self.client
            .rename(&abs_old, &new_name)
            .await
            .with_context(|| format!("rename remote '{old}' -> '{new}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyvault_crypto::derive_key;

    fn client() -> Arc<DriveClient> {
        Arc::new(DriveClient::new("https://drive.example.com", "tok", "test").unwrap())
    }

    #[test]
    fn root_is_normalized() {
        let fs = RemoteFileSystem::new(client(), "apps/skyvault/", None);
        assert_eq!(fs.root(), "/apps/skyvault");

        let fs = RemoteFileSystem::new(client(), "/apps/skyvault", None);
        assert_eq!(fs.root(), "/apps/skyvault");
    }

    #[test]
    fn to_abs_joins_under_root() {
        let fs = RemoteFileSystem::new(client(), "/apps/skyvault", None);
        assert_eq!(fs.to_abs("").unwrap(), "/apps/skyvault");
        assert_eq!(
            fs.to_abs("docs/a.txt").unwrap(),
            "/apps/skyvault/docs/a.txt"
        );
    }

    #[test]
    fn to_abs_encrypts_each_segment() {
        let key = derive_key("names");
        let fs = RemoteFileSystem::new(client(), "/apps/skyvault", Some(key));

        let abs = fs.to_abs("docs/a.txt").unwrap();
        let mut parts = abs.trim_start_matches("/apps/skyvault/").split('/');
        let dir = parts.next().unwrap();
        let file = parts.next().unwrap();
        assert_eq!(decrypt_name(dir, &key).unwrap(), "docs");
        assert_eq!(decrypt_name(file, &key).unwrap(), "a.txt");
    }

    #[test]
    fn plain_name_falls_back_on_undecryptable_segments() {
        let key = derive_key("names");
        let fs = RemoteFileSystem::new(client(), "/apps/skyvault", Some(key));

        let sealed = encrypt_name("secret.txt", &key).unwrap();
        assert_eq!(fs.plain_name(&sealed), "secret.txt");
        assert_eq!(fs.plain_name("legacy-plain.txt"), "legacy-plain.txt");
    }
}

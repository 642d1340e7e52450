//! Typed HTTP client for the drive API
//!
//! Endpoints (all relative to the configured base URL):
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | list | `GET /api/v1/files?dir=<abs>` | `{ "entries": [FileEntry] }` |
//! | download | `GET /api/v1/files/content?path=<abs>` | byte stream |
//! | upload | `PUT /api/v1/files/content?path=<abs>` (streamed body) | `{ "md5": "..." }` |
//! | delete | `POST /api/v1/files/delete` `{ "path" }` | empty |
//! | rename | `POST /api/v1/files/rename` `{ "path", "new_name" }` | empty |
//!
//! Uploads are atomic on the server side: a failed transfer never leaves
//! a partial file visible under the target path. The server responds with
//! the MD5 it computed over the bytes it received, which the transfer
//! pipeline records as the remote hash.

use futures::TryStreamExt;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;
use url::Url;

use skyvault_core::ports::ByteStream;

use crate::RemoteError;

/// One entry of a directory listing as the drive reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEntry {
    /// Name as stored on the server (encrypted when filename encryption
    /// is on).
    pub server_filename: String,
    /// Stored size in bytes (ciphertext size when content encryption is
    /// on).
    pub size: u64,
    /// Server-side modification time, seconds since the Unix epoch. The
    /// drive sets this itself; zero means "not provided".
    #[serde(default)]
    pub server_mtime: i64,
    pub is_dir: bool,
    /// MD5 of the stored bytes, lowercase hex.
    #[serde(default)]
    pub md5: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    entries: Vec<RemoteEntry>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    md5: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: Option<String>,
}

/// HTTP client for the drive API
///
/// One instance is shared by all transfer workers; `reqwest`'s connection
/// pool handles the concurrency.
pub struct DriveClient {
    http: Client,
    base_url: Url,
    access_token: String,
}

impl DriveClient {
    /// Creates a client for the drive at `base_url`.
    pub fn new(
        base_url: &str,
        access_token: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            access_token: access_token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
        let url = self.base_url.join(path)?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(&self.access_token))
    }

    /// Maps non-success statuses to [`RemoteError::Api`], using the JSON
    /// error body when the server sent one.
    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message.unwrap_or_else(|| status.to_string()),
            Err(_) => status.to_string(),
        };

        Err(RemoteError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Lists one directory (non-recursive).
    pub async fn list_dir(&self, dir: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        debug!(dir, "listing remote directory");
        let response = self
            .request(Method::GET, "/api/v1/files")?
            .query(&[("dir", dir)])
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(body.entries)
    }

    /// Opens a download stream for a file.
    pub async fn download(&self, path: &str) -> Result<ByteStream, RemoteError> {
        debug!(path, "opening remote download stream");
        let response = self
            .request(Method::GET, "/api/v1/files/content")?
            .query(&[("path", path)])
            .send()
            .await?;
        let response = Self::check(response).await?;

        let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        Ok(Box::new(StreamReader::new(stream)))
    }

    /// Uploads a full stream to `path`, returning the server-computed MD5.
    pub async fn upload(&self, path: &str, stream: ByteStream) -> Result<String, RemoteError> {
        debug!(path, "uploading to remote");
        let body = reqwest::Body::wrap_stream(ReaderStream::new(stream));
        let response = self
            .request(Method::PUT, "/api/v1/files/content")?
            .query(&[("path", path)])
            .body(body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(body.md5)
    }

    /// Deletes a file or directory.
    pub async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        debug!(path, "deleting remote entry");
        let response = self
            .request(Method::POST, "/api/v1/files/delete")?
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Renames an entry in place. `new_name` is a bare name, not a path;
    /// the drive does not support moving between directories.
    pub async fn rename(&self, path: &str, new_name: &str) -> Result<(), RemoteError> {
        debug!(path, new_name, "renaming remote entry");
        let response = self
            .request(Method::POST, "/api/v1/files/rename")?
            .json(&serde_json::json!({ "path": path, "new_name": new_name }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

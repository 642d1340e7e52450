//! skyvault-remote - Remote drive access
//!
//! Two layers:
//!
//! - [`DriveClient`] is a typed HTTP client for the drive's JSON API
//!   (list, streaming download/upload, delete, in-place rename).
//! - [`RemoteFileSystem`] adapts that client to the `FileSystem` port,
//!   including the optional filename-encryption path transform: every
//!   path segment is encrypted before it reaches the wire and decrypted
//!   when listings come back.

pub mod adapter;
pub mod client;

pub use adapter::RemoteFileSystem;
pub use client::{DriveClient, RemoteEntry};

/// Errors from the drive API client
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The drive answered with a non-success status
    #[error("drive API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (connect, TLS, body read)
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured base URL or a constructed endpoint was invalid
    #[error("invalid drive URL: {0}")]
    Url(#[from] url::ParseError),

    /// A response body did not match the documented shape
    #[error("malformed drive response: {0}")]
    Decode(String),
}

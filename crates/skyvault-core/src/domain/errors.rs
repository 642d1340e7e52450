//! Domain error types

use thiserror::Error;

/// Errors produced when constructing a [`RelPath`](super::relpath::RelPath).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("relative path is empty")]
    Empty,

    #[error("path '{0}' must be relative with no trailing separator")]
    NotRelative(String),

    #[error("path '{0}' contains an empty component")]
    EmptyComponent(String),

    #[error("path '{0}' contains a '.' or '..' component")]
    DotComponent(String),

    #[error("path '{0}' contains a backslash; use '/' separators")]
    Backslash(String),
}

//! Canonical relative paths
//!
//! Every component of the system identifies a file by the same key: a
//! `/`-separated path relative to the sync root of whichever side is being
//! addressed. [`RelPath`] enforces the canonical form at construction so
//! that lookups across the local tree, the remote store, and the snapshot
//! database never disagree on separators or stray dot components.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::PathError;

/// A canonicalized relative path.
///
/// Invariants, enforced by [`RelPath::new`]:
/// - non-empty, uses `/` as the only separator
/// - no leading or trailing `/`
/// - no empty, `.`, or `..` components
/// - no backslashes (callers convert platform paths before constructing)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
    /// Validates `path` and wraps it.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();

        if path.is_empty() {
            return Err(PathError::Empty);
        }
        if path.contains('\\') {
            return Err(PathError::Backslash(path));
        }
        if path.starts_with('/') || path.ends_with('/') {
            return Err(PathError::NotRelative(path));
        }
        for component in path.split('/') {
            match component {
                "" => return Err(PathError::EmptyComponent(path.clone())),
                "." | ".." => return Err(PathError::DotComponent(path.clone())),
                _ => {}
            }
        }

        Ok(Self(path))
    }

    /// Returns the path as a `/`-separated string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the final component of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns the parent path, or `None` for a top-level entry.
    pub fn parent(&self) -> Option<RelPath> {
        self.0.rsplit_once('/').map(|(dir, _)| Self(dir.to_string()))
    }

    /// Joins a single child name onto this path.
    pub fn join(&self, name: &str) -> Result<RelPath, PathError> {
        Self::new(format!("{}/{}", self.0, name))
    }

    /// Appends a literal suffix to the final component.
    ///
    /// Used for conflict renames (`report.pdf` -> `report.pdf.local`);
    /// the suffix must not contain a separator.
    pub fn with_suffix(&self, suffix: &str) -> RelPath {
        debug_assert!(!suffix.contains('/'));
        Self(format!("{}{}", self.0, suffix))
    }
}

impl Display for RelPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RelPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelPath> for String {
    fn from(path: RelPath) -> Self {
        path.0
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

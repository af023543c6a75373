//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Run identifier
// ============================================================================

/// Identifier for a single reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RunId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid RunId: {e}")))
    }
}

// ============================================================================
// Object keys
// ============================================================================

/// A validated object key, relative to the bucket root
///
/// Object keys mirror local relative paths and are the join key between the
/// local tree and the remote listing. A key:
/// - is non-empty and does not start with `/`
/// - uses `/` as the only separator
/// - contains no empty, `.` or `..` segments
///
/// A single trailing `/` is accepted and marks a directory placeholder object,
/// which some S3 tools create and which never maps to a local file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create a new ObjectKey
    ///
    /// # Errors
    /// Returns `DomainError::InvalidKey` if the key is empty, absolute, or
    /// contains empty or traversal segments
    pub fn new(key: String) -> Result<Self, DomainError> {
        if key.is_empty() {
            return Err(DomainError::InvalidKey("Key cannot be empty".to_string()));
        }
        if key.starts_with('/') {
            return Err(DomainError::InvalidKey(format!(
                "Key must be relative: {key}"
            )));
        }
        if key.contains('\0') {
            return Err(DomainError::InvalidKey(format!(
                "Key contains a NUL byte: {key:?}"
            )));
        }

        let body = key.strip_suffix('/').unwrap_or(&key);
        for segment in body.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(DomainError::InvalidKey(format!(
                    "Key contains an invalid segment: {key}"
                )));
            }
        }

        Ok(Self(key))
    }

    /// Build a key from a path relative to the local root
    ///
    /// Only normal components are accepted; the components are joined with `/`
    /// regardless of the platform separator.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidKey` for non-UTF-8 names, absolute paths or
    /// traversal components
    pub fn from_relative_path(path: &Path) -> Result<Self, DomainError> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        DomainError::InvalidKey(format!(
                            "Path is not valid UTF-8: {}",
                            path.display()
                        ))
                    })?;
                    segments.push(name);
                }
                Component::CurDir => {}
                _ => {
                    return Err(DomainError::InvalidKey(format!(
                        "Path is not a plain relative path: {}",
                        path.display()
                    )))
                }
            }
        }
        Self::new(segments.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this key is a directory placeholder (trailing `/`)
    #[must_use]
    pub fn is_directory_marker(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Get the last segment of the key (the base name)
    #[must_use]
    pub fn file_name(&self) -> &str {
        let body = self.0.strip_suffix('/').unwrap_or(&self.0);
        body.rsplit('/').next().unwrap_or(body)
    }

    /// Map this key to a path below `root`
    #[must_use]
    pub fn to_local_path(&self, root: &Path) -> PathBuf {
        let body = self.0.strip_suffix('/').unwrap_or(&self.0);
        body.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

// ============================================================================
// Content hashes
// ============================================================================

/// SHA-256 content digest in lowercase hexadecimal
///
/// Comparison is exact: two hashes are equal only if their strings are
/// byte-for-byte identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of a hex-encoded SHA-256 digest
    pub const HEX_LEN: usize = 64;

    /// Create a new ContentHash
    ///
    /// # Errors
    /// Returns error if the hash is not 64 lowercase hex characters
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.len() != Self::HEX_LEN {
            return Err(DomainError::InvalidHash(format!(
                "Hash has wrong length: expected {} characters, got {}",
                Self::HEX_LEN,
                hash.len()
            )));
        }

        if !hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(DomainError::InvalidHash(format!(
                "Hash is not lowercase hex: {hash}"
            )));
        }

        Ok(Self(hash))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// Bucket names
// ============================================================================

/// Name of the remote bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Create a new BucketName
    ///
    /// # Errors
    /// Returns error if the name is empty or contains `/` or whitespace
    pub fn new(name: String) -> Result<Self, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidBucket(
                "Bucket name cannot be empty".to_string(),
            ));
        }
        if trimmed.contains('/') || trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidBucket(format!(
                "Bucket name contains invalid characters: {name}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BucketName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BucketName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for BucketName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}

// ============================================================================
// Unit tests
// ============================================================================

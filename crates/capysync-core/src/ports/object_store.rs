//! Object store port (driven/secondary port)
//!
//! This module defines the interface to an S3-compatible bucket. The engine
//! only needs paged listing, a digest lookup, and whole-object transfers.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport errors are adapter-specific.
//!   Adapters wrap their errors in [`RemoteError`] so that the engine can
//!   tell transient failures from permanent ones without reading messages.
//! - Listing returns raw key strings. Validation into `ObjectKey` happens in
//!   the engine so that a single odd key does not fail the whole listing.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{BucketName, ContentHash, ObjectKey};

// ============================================================================
// Listing DTOs
// ============================================================================

/// One entry of a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedObject {
    pub key: String,
    pub etag: String,
    pub size: u64,
}

/// A single page of a bucket listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectListPage {
    pub objects: Vec<ListedObject>,
    /// Token for the next page; `None` on the last page
    pub next_continuation: Option<String>,
}

impl ObjectListPage {
    /// Returns true if more pages follow
    pub fn has_more(&self) -> bool {
        self.next_continuation.is_some()
    }
}

// ============================================================================
// Remote errors
// ============================================================================

/// Whether retrying a failed remote call can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFault {
    /// Network trouble, throttling or a server-side error
    Transient {
        /// Wait requested by the service, if any
        retry_after: Option<Duration>,
    },
    /// Rejected request; retrying returns the same answer
    Permanent,
}

/// An adapter error tagged with its [`RemoteFault`]
///
/// Displays as the wrapped error, so context added on top of it reads the
/// same as without the tag.
#[derive(Debug)]
pub struct RemoteError {
    fault: RemoteFault,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl RemoteError {
    pub fn new(
        fault: RemoteFault,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            fault,
            source: source.into(),
        }
    }

    pub fn transient(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::new(RemoteFault::Transient { retry_after: None }, source)
    }

    pub fn permanent(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::new(RemoteFault::Permanent, source)
    }

    pub fn fault(&self) -> RemoteFault {
        self.fault
    }

    /// The wrapped adapter error, for downcasting
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.fault, RemoteFault::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self.fault {
            RemoteFault::Transient { retry_after } => retry_after,
            RemoteFault::Permanent => None,
        }
    }

    /// Find the tag anywhere in an `anyhow` chain
    pub fn find(err: &anyhow::Error) -> Option<&RemoteError> {
        err.chain().find_map(|e| e.downcast_ref::<RemoteError>())
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

// ============================================================================
// IObjectStore trait
// ============================================================================

/// Port trait for bucket operations
///
/// ## Implementation Notes
///
/// - Implementations should not retry internally; the engine wraps every
///   call in its retry policy.
/// - Errors should carry a [`RemoteError`] in their chain. Untagged errors
///   are classified by the text of their root cause.
/// - `put_object` must store `hash` as object metadata so that a later
///   `head_object_hash` returns it unchanged.
#[async_trait::async_trait]
pub trait IObjectStore: Send + Sync {
    /// Fetch one page of the listing
    ///
    /// # Arguments
    /// * `bucket` - Bucket to list
    /// * `continuation` - Token from the previous page, `None` for the first page
    async fn list_objects_page(
        &self,
        bucket: &BucketName,
        continuation: Option<&str>,
    ) -> anyhow::Result<ObjectListPage>;

    /// Read the content digest stored in the object's metadata
    ///
    /// # Returns
    /// `None` if the object has no digest metadata or no longer exists
    async fn head_object_hash(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> anyhow::Result<Option<ContentHash>>;

    /// Write the whole object, overwriting any existing one
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        data: &[u8],
        hash: &ContentHash,
    ) -> anyhow::Result<()>;

    /// Read the whole object
    async fn get_object(&self, bucket: &BucketName, key: &ObjectKey) -> anyhow::Result<Vec<u8>>;

    /// Delete the object; deleting a missing object succeeds
    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> anyhow::Result<()>;
}

//! S3ObjectStore - IObjectStore implementation for S3-compatible services
//!
//! Adapts [`S3Client`] to the [`IObjectStore`] port. Every [`S3Error`] is
//! tagged as a [`RemoteError`] with its retry classification, then wrapped
//! with `anyhow` context naming the operation.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use capysync_core::domain::newtypes::{BucketName, ContentHash, ObjectKey};
use capysync_core::ports::object_store::{IObjectStore, ObjectListPage, RemoteError};

use crate::client::S3Client;
use crate::S3Error;

fn tagged<T>(result: Result<T, S3Error>) -> Result<T, RemoteError> {
    result.map_err(RemoteError::from)
}

/// S3-backed object store
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    page_size: Option<u32>,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self {
            client,
            page_size: None,
        }
    }

    /// Requests at most `page_size` keys per listing page
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn client(&self) -> &S3Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl IObjectStore for S3ObjectStore {
    async fn list_objects_page(
        &self,
        bucket: &BucketName,
        continuation: Option<&str>,
    ) -> Result<ObjectListPage> {
        let result = tagged(
            self.client
                .list_objects_v2(bucket.as_str(), continuation, self.page_size)
                .await,
        )
        .with_context(|| format!("Failed to list bucket {bucket}"))?;

        debug!(
            bucket = %bucket,
            objects = result.contents.len(),
            truncated = result.is_truncated,
            "Listed page"
        );

        tagged(result.into_page())
            .with_context(|| format!("Malformed listing for bucket {bucket}"))
    }

    async fn head_object_hash(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> Result<Option<ContentHash>> {
        let head = tagged(self.client.head_object(bucket.as_str(), key.as_str()).await)
            .with_context(|| format!("Failed to read metadata of {key}"))?;

        let Some(raw) = head.and_then(|h| h.content_hash) else {
            return Ok(None);
        };

        match ContentHash::new(raw.trim().to_ascii_lowercase()) {
            Ok(hash) => Ok(Some(hash)),
            Err(e) => {
                warn!(key = %key, value = %raw, error = %e, "Ignoring malformed digest metadata");
                Ok(None)
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        data: &[u8],
        hash: &ContentHash,
    ) -> Result<()> {
        let etag = tagged(
            self.client
                .put_object(bucket.as_str(), key.as_str(), data.to_vec(), hash.as_str())
                .await,
        )
        .with_context(|| format!("Failed to upload {key}"))?;

        debug!(key = %key, bytes = data.len(), etag = ?etag, "Uploaded object");
        Ok(())
    }

    async fn get_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<Vec<u8>> {
        let body = tagged(self.client.get_object(bucket.as_str(), key.as_str()).await)
            .with_context(|| format!("Failed to download {key}"))?;
        Ok(body.data)
    }

    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<()> {
        tagged(self.client.delete_object(bucket.as_str(), key.as_str()).await)
            .with_context(|| format!("Failed to delete {key}"))
    }
}

//! Transfer executor
//!
//! Carries out uploads, deletions and downloads against the object store.
//! Every remote call goes through the run's retry policy. In dry-run mode
//! each operation is logged and nothing is transferred.
//!
//! Downloads are written to a temporary sibling and renamed into place, so a
//! failed or interrupted download never leaves a partial file at the target.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use capysync_core::domain::inventory::LocalFileRecord;
use capysync_core::domain::newtypes::{BucketName, ObjectKey};
use capysync_core::ports::object_store::IObjectStore;

use crate::hasher::hash_bytes;
use crate::retry::RetryPolicy;
use crate::SyncError;

/// Suffix of in-progress download files
pub const TEMP_SUFFIX: &str = ".capysync.tmp";

/// Performs the remote side effects of a run
pub struct TransferExecutor<'a> {
    store: &'a dyn IObjectStore,
    bucket: &'a BucketName,
    retry: &'a RetryPolicy,
    dry_run: bool,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(
        store: &'a dyn IObjectStore,
        bucket: &'a BucketName,
        retry: &'a RetryPolicy,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            bucket,
            retry,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Upload a local file, overwriting any object at its key
    ///
    /// The digest stored as metadata is computed from the bytes actually
    /// sent, so a file modified after planning is still labelled correctly.
    #[instrument(skip(self, record), fields(key = %record.key, size = record.size))]
    pub async fn upload(&self, record: &LocalFileRecord) -> Result<(), SyncError> {
        if self.dry_run {
            info!("dry run: would upload");
            return Ok(());
        }

        let data = tokio::fs::read(&record.absolute_path)
            .await
            .map_err(|e| SyncError::local_io(&record.absolute_path, e))?;

        let hash = hash_bytes(&data)?;
        if hash != record.hash {
            warn!("file changed since it was hashed, uploading current content");
        }

        let store = self.store;
        let bucket = self.bucket;
        let key = &record.key;
        let data = data.as_slice();
        let hash_ref = &hash;
        self.retry
            .run("put_object", || async move {
                store.put_object(bucket, key, data, hash_ref).await
            })
            .await
            .map_err(|e| SyncError::remote(format!("put_object {key}"), &e))?;

        info!(bytes = data.len(), "uploaded object");
        Ok(())
    }

    /// Delete a remote object
    #[instrument(skip(self), fields(key = %key))]
    pub async fn delete(&self, key: &ObjectKey) -> Result<(), SyncError> {
        if self.dry_run {
            info!("dry run: would delete");
            return Ok(());
        }

        let store = self.store;
        let bucket = self.bucket;
        self.retry
            .run("delete_object", || async move {
                store.delete_object(bucket, key).await
            })
            .await
            .map_err(|e| SyncError::remote(format!("delete_object {key}"), &e))?;

        info!("deleted object");
        Ok(())
    }

    /// Download an object to its mirrored path below `root`
    ///
    /// Returns the number of bytes written.
    #[instrument(skip(self, root), fields(key = %key))]
    pub async fn download(&self, key: &ObjectKey, root: &Path) -> Result<u64, SyncError> {
        let target = key.to_local_path(root);
        if self.dry_run {
            info!(path = %target.display(), "dry run: would download");
            return Ok(0);
        }

        let store = self.store;
        let bucket = self.bucket;
        let data = self
            .retry
            .run("get_object", || async move { store.get_object(bucket, key).await })
            .await
            .map_err(|e| SyncError::remote(format!("get_object {key}"), &e))?;

        write_atomic(&target, &data).await?;

        info!(bytes = data.len(), path = %target.display(), "downloaded object");
        Ok(data.len() as u64)
    }
}

/// Write `data` to `target` via a temporary sibling and a rename
pub async fn write_atomic(target: &Path, data: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::local_io(parent, e))?;
    }

    let tmp_path = temp_path_for(target);
    debug!(?tmp_path, "writing to temporary file");
    if let Err(e) = tokio::fs::write(&tmp_path, data).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(SyncError::local_io(target, e));
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, target).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(SyncError::local_io(target, e));
    }
    Ok(())
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut p = target.as_os_str().to_owned();
    p.push(TEMP_SUFFIX);
    PathBuf::from(p)
}

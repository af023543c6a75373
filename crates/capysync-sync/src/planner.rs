//! Diff planner
//!
//! Decides per key whether to skip, upload, or delete. Change detection is
//! by content digest only: the local SHA-256 against the digest stored in the
//! remote object's metadata. No size or timestamp shortcut is taken.

use std::sync::Mutex;

use tracing::{debug, instrument, warn};

use capysync_core::config::MetadataFailurePolicy;
use capysync_core::domain::inventory::{LocalFileRecord, RemoteInventory};
use capysync_core::domain::newtypes::{BucketName, ObjectKey};
use capysync_core::domain::run::{PlanAction, UploadReason};
use capysync_core::ports::object_store::IObjectStore;

use crate::retry::RetryPolicy;
use crate::walker::IgnoreFilter;
use crate::SyncError;

/// Classifies local files against the run's remote inventory
pub struct DiffPlanner<'a> {
    store: &'a dyn IObjectStore,
    bucket: &'a BucketName,
    retry: &'a RetryPolicy,
    policy: MetadataFailurePolicy,
}

impl<'a> DiffPlanner<'a> {
    pub fn new(
        store: &'a dyn IObjectStore,
        bucket: &'a BucketName,
        retry: &'a RetryPolicy,
        policy: MetadataFailurePolicy,
    ) -> Self {
        Self {
            store,
            bucket,
            retry,
            policy,
        }
    }

    /// Decide what to do with one local file
    ///
    /// A key present in the inventory is taken out of it before the remote
    /// digest is fetched, so it is never considered for deletion whatever
    /// the outcome. The inventory lock is released before any remote call.
    ///
    /// # Errors
    /// `SyncError::RemoteUnavailable` if the digest lookup fails after
    /// retries and the policy is `Abort`
    #[instrument(skip(self, local, inventory), fields(key = %local.key))]
    pub async fn classify(
        &self,
        local: &LocalFileRecord,
        inventory: &Mutex<RemoteInventory>,
    ) -> Result<PlanAction, SyncError> {
        let matched = {
            let mut guard = inventory.lock().unwrap_or_else(|p| p.into_inner());
            guard.take(&local.key)
        };

        if matched.is_none() {
            debug!("no remote object");
            return Ok(PlanAction::Upload(UploadReason::New));
        }

        let store = self.store;
        let bucket = self.bucket;
        let key = &local.key;
        let remote_hash = self
            .retry
            .run("head_object", || async move {
                store.head_object_hash(bucket, key).await
            })
            .await;

        match remote_hash {
            Ok(Some(hash)) if hash == local.hash => {
                debug!("digest matches");
                Ok(PlanAction::Skip)
            }
            Ok(Some(hash)) => {
                debug!(remote = %hash, local = %local.hash, "digest differs");
                Ok(PlanAction::Upload(UploadReason::Changed))
            }
            Ok(None) => {
                debug!("remote object has no digest metadata");
                Ok(PlanAction::Upload(UploadReason::Changed))
            }
            Err(e) => match self.policy {
                MetadataFailurePolicy::Reupload => {
                    warn!(error = %format!("{e:#}"), "metadata lookup failed, re-uploading");
                    Ok(PlanAction::Upload(UploadReason::Changed))
                }
                MetadataFailurePolicy::Abort => {
                    Err(SyncError::remote(format!("head_object {key}"), &e))
                }
            },
        }
    }
}

/// Keys left in the inventory that should be deleted remotely, in key order
///
/// Keys the ignore filter excludes and directory placeholders are kept.
pub fn plan_deletions(mut remaining: RemoteInventory, filter: &IgnoreFilter) -> Vec<ObjectKey> {
    remaining
        .drain()
        .into_iter()
        .map(|record| record.key)
        .filter(|key| {
            if key.is_directory_marker() {
                debug!(key = %key, "keeping directory placeholder");
                return false;
            }
            if filter.is_ignored_key(key) {
                debug!(key = %key, "keeping ignored remote object");
                return false;
            }
            true
        })
        .collect()
}

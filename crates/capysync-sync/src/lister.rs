//! Remote listing
//!
//! Reads every page of the bucket listing into a [`RemoteInventory`]. The
//! listing must be complete before any mutation happens, so a page that still
//! fails after retries aborts the run.

use tracing::{debug, info, instrument, warn};

use capysync_core::domain::inventory::{RemoteInventory, RemoteObjectRecord};
use capysync_core::domain::newtypes::{BucketName, ObjectKey};
use capysync_core::ports::object_store::IObjectStore;

use crate::retry::RetryPolicy;
use crate::SyncError;

/// List the whole bucket, following continuation tokens to the end
///
/// Keys that are not valid object keys (absolute, `..` segments, ...) are
/// logged and left out of the inventory.
///
/// # Errors
/// `SyncError::RemoteUnavailable` if any page fails after retries
#[instrument(skip(store, retry), fields(bucket = %bucket))]
pub async fn list_inventory(
    store: &dyn IObjectStore,
    bucket: &BucketName,
    retry: &RetryPolicy,
) -> Result<RemoteInventory, SyncError> {
    let mut inventory = RemoteInventory::new();
    let mut continuation: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let token = continuation.clone();
        let page = retry
            .run("list_objects", || {
                let token_ref = token.as_deref();
                async move { store.list_objects_page(bucket, token_ref).await }
            })
            .await
            .map_err(|e| SyncError::remote("list_objects", &e))?;
        pages += 1;

        debug!(
            page = pages,
            objects = page.objects.len(),
            has_more = page.has_more(),
            "listing page received"
        );

        for object in page.objects {
            match ObjectKey::new(object.key.clone()) {
                Ok(key) => inventory.insert(RemoteObjectRecord::new(key, object.etag)),
                Err(e) => warn!(key = %object.key, error = %e, "skipping unusable remote key"),
            }
        }

        match page.next_continuation {
            Some(next) if continuation.as_deref() != Some(next.as_str()) => {
                continuation = Some(next);
            }
            Some(next) => {
                return Err(SyncError::RemoteUnavailable {
                    operation: "list_objects".to_string(),
                    message: format!("store returned the same continuation token twice: {next}"),
                });
            }
            None => break,
        }
    }

    info!(objects = inventory.len(), pages, "remote listing complete");
    Ok(inventory)
}

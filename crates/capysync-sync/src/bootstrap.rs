//! Bootstrap downloader
//!
//! When the local tree holds no eligible file, the run mirrors the bucket
//! down instead of pushing up: every listed object is downloaded to its
//! mirrored path. Nothing is ever deleted on this path.

use std::path::Path;
use std::sync::Mutex;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use capysync_core::domain::inventory::RemoteInventory;
use capysync_core::domain::newtypes::ObjectKey;

use crate::executor::TransferExecutor;
use crate::walker::IgnoreFilter;
use crate::SyncError;

/// Keys of `inventory` that bootstrap should download, in key order
pub fn bootstrap_keys(inventory: &RemoteInventory, filter: &IgnoreFilter) -> Vec<ObjectKey> {
    inventory
        .keys()
        .filter(|key| {
            if key.is_directory_marker() {
                debug!(key = %key, "skipping directory placeholder");
                return false;
            }
            if filter.is_ignored_key(key) {
                debug!(key = %key, "skipping ignored object");
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

/// Download every eligible object into `root`
///
/// Returns the downloaded keys in key order. Once `cancel` fires no new
/// download starts; those already running are allowed to finish.
///
/// # Errors
/// The first download failure, or `SyncError::Cancelled`
#[instrument(skip_all, fields(root = %root.display(), objects = inventory.len()))]
pub async fn download_all(
    executor: &TransferExecutor<'_>,
    inventory: &RemoteInventory,
    root: &Path,
    filter: &IgnoreFilter,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<Vec<ObjectKey>, SyncError> {
    let keys = bootstrap_keys(inventory, filter);
    let downloaded = Mutex::new(Vec::with_capacity(keys.len()));

    stream::iter(keys.into_iter().map(Ok::<_, SyncError>))
        .take_until(cancel.cancelled())
        .try_for_each_concurrent(concurrency.max(1), |key| {
            let downloaded = &downloaded;
            async move {
                executor.download(&key, root).await?;
                downloaded
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push(key);
                Ok(())
            }
        })
        .await?;

    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }

    let mut downloaded = downloaded.into_inner().unwrap_or_else(|p| p.into_inner());
    downloaded.sort();
    info!(count = downloaded.len(), "bootstrap download complete");
    Ok(downloaded)
}

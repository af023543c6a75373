//! Shared test helpers for engine integration tests
//!
//! Provides an in-memory [`IObjectStore`] with paging, failure injection and
//! call counters, plus helpers to lay out local trees.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use capysync_core::config::RunConfig;
use capysync_core::domain::newtypes::{BucketName, ContentHash, ObjectKey, RunId};
use capysync_core::ports::object_store::{IObjectStore, ListedObject, ObjectListPage};
use capysync_core::ports::progress::{IProgressObserver, RunOutcome};
use capysync_sync::hasher::hash_bytes;
use capysync_sync::{ReconciliationEngine, RetryPolicy};
use tokio_util::sync::CancellationToken;

pub const BUCKET: &str = "test-bucket";

pub fn bucket() -> BucketName {
    BucketName::new(BUCKET.to_string()).unwrap()
}

// ============================================================================
// In-memory object store
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub hash: Option<ContentHash>,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    page_size: Mutex<Option<usize>>,

    pub lists: AtomicUsize,
    pub heads: AtomicUsize,
    pub puts: AtomicUsize,
    pub gets: AtomicUsize,
    pub deletes: AtomicUsize,

    fail_list: AtomicBool,
    transient_list_failures: AtomicU32,
    fail_head: AtomicBool,
    fail_put_key: Mutex<Option<String>>,
    put_delay: Mutex<Option<Duration>>,
    cancel_on_put: Mutex<Option<CancellationToken>>,

    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store an object together with its correct digest metadata
    pub fn insert(&self, key: &str, data: &[u8]) {
        let hash = hash_bytes(data).unwrap();
        self.insert_raw(key, data, Some(hash));
    }

    /// Store an object with arbitrary (or no) digest metadata
    pub fn insert_raw(&self, key: &str, data: &[u8], hash: Option<ContentHash>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                hash,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn set_page_size(&self, size: usize) {
        *self.page_size.lock().unwrap() = Some(size);
    }

    pub fn fail_listing(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn fail_listing_transiently(&self, times: u32) {
        self.transient_list_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_metadata(&self) {
        self.fail_head.store(true, Ordering::SeqCst);
    }

    pub fn fail_put_for(&self, key: &str) {
        *self.fail_put_key.lock().unwrap() = Some(key.to_string());
    }

    pub fn set_put_delay(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    pub fn cancel_on_first_put(&self, token: CancellationToken) {
        *self.cancel_on_put.lock().unwrap() = Some(token);
    }

    pub fn transfers(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
            + self.gets.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IObjectStore for MemoryObjectStore {
    async fn list_objects_page(
        &self,
        _bucket: &BucketName,
        continuation: Option<&str>,
    ) -> anyhow::Result<ObjectListPage> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            anyhow::bail!("Access denied (403) listing bucket");
        }
        if self
            .transient_list_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("connection reset by peer");
        }

        let objects = self.objects.lock().unwrap();
        let start: usize = continuation.map(|t| t.parse()).transpose()?.unwrap_or(0);
        let page_size = self.page_size.lock().unwrap().unwrap_or(usize::MAX);
        let end = start.saturating_add(page_size).min(objects.len());

        let page = objects
            .iter()
            .skip(start)
            .take(end - start)
            .map(|(key, obj)| ListedObject {
                key: key.clone(),
                etag: format!("\"{}\"", obj.data.len()),
                size: obj.data.len() as u64,
            })
            .collect();

        Ok(ObjectListPage {
            objects: page,
            next_continuation: (end < objects.len()).then(|| end.to_string()),
        })
    }

    async fn head_object_hash(
        &self,
        _bucket: &BucketName,
        key: &ObjectKey,
    ) -> anyhow::Result<Option<ContentHash>> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        if self.fail_head.load(Ordering::SeqCst) {
            anyhow::bail!("HTTP 503 service unavailable");
        }
        Ok(self.get(key.as_str()).and_then(|o| o.hash))
    }

    async fn put_object(
        &self,
        _bucket: &BucketName,
        key: &ObjectKey,
        data: &[u8],
        hash: &ContentHash,
    ) -> anyhow::Result<()> {
        if self.fail_put_key.lock().unwrap().as_deref() == Some(key.as_str()) {
            anyhow::bail!("Forbidden: put rejected for {key}");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(token) = self.cancel_on_put.lock().unwrap().take() {
            token.cancel();
        }
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.insert_raw(key.as_str(), data, Some(hash.clone()));
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_object(&self, _bucket: &BucketName, key: &ObjectKey) -> anyhow::Result<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.get(key.as_str())
            .map(|o| o.data)
            .ok_or_else(|| anyhow::anyhow!("Not found: {key}"))
    }

    async fn delete_object(&self, _bucket: &BucketName, key: &ObjectKey) -> anyhow::Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key.as_str());
        Ok(())
    }
}

// ============================================================================
// Progress observer
// ============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub outcomes: Mutex<Vec<RunOutcome>>,
}

impl IProgressObserver for RecordingObserver {
    fn on_start(&self, _run_id: RunId) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stop(&self, _run_id: RunId, outcome: &RunOutcome) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

// ============================================================================
// Engine and tree helpers
// ============================================================================

pub fn run_config(root: &Path) -> RunConfig {
    RunConfig::new(bucket(), root)
}

/// Engine with retries disabled so failures surface immediately
pub fn engine(store: &Arc<MemoryObjectStore>, config: RunConfig) -> ReconciliationEngine {
    ReconciliationEngine::new(store.clone(), config).with_retry_policy(RetryPolicy::none())
}

pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

pub fn keys(list: &[ObjectKey]) -> Vec<&str> {
    list.iter().map(ObjectKey::as_str).collect()
}

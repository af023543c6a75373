//! Remote inventory and per-run file records
//!
//! A [`RemoteInventory`] is built from the bucket listing at the start of every
//! run. While the local tree is walked, each matched key is taken out of the
//! inventory; whatever remains afterwards exists only remotely.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::newtypes::{ContentHash, ObjectKey};

/// One object from the remote listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObjectRecord {
    pub key: ObjectKey,
    /// Opaque ETag as reported by the store; not used for change detection
    pub etag: String,
}

impl RemoteObjectRecord {
    pub fn new(key: ObjectKey, etag: impl Into<String>) -> Self {
        Self {
            key,
            etag: etag.into(),
        }
    }
}

/// A regular file found under the local root, with its content digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    pub key: ObjectKey,
    pub hash: ContentHash,
    pub absolute_path: PathBuf,
    pub size: u64,
}

/// Key-ordered view of the bucket for the duration of one run
#[derive(Debug, Clone, Default)]
pub struct RemoteInventory {
    entries: BTreeMap<ObjectKey, RemoteObjectRecord>,
}

impl RemoteInventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from listing records; later duplicates replace earlier ones
    pub fn from_records(records: impl IntoIterator<Item = RemoteObjectRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect();
        Self { entries }
    }

    pub fn insert(&mut self, record: RemoteObjectRecord) {
        self.entries.insert(record.key.clone(), record);
    }

    /// Remove and return the record for `key`
    ///
    /// Called once per matched local file, so that the keys remaining after
    /// the walk are exactly those with no local counterpart.
    pub fn take(&mut self, key: &ObjectKey) -> Option<RemoteObjectRecord> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&RemoteObjectRecord> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in lexicographic order
    pub fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.entries.keys()
    }

    /// Consume all remaining records in key order
    pub fn drain(&mut self) -> Vec<RemoteObjectRecord> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

//! Local tree walker
//!
//! Enumerates the regular files under the local root, depth-first in file-name
//! order, without following symlinks. Files whose base name starts with the
//! ignore marker are dropped when ignore mode is on; directories themselves are
//! never yielded, so an empty subdirectory contributes nothing.
//!
//! The walk itself is synchronous (`walkdir`). [`LocalTreeWalker::stream`]
//! moves it onto the blocking pool and hands entries over a bounded channel,
//! so the async side pulls entries lazily with backpressure.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use capysync_core::domain::newtypes::ObjectKey;

use crate::SyncError;

// ============================================================================
// Ignore filter
// ============================================================================

/// Base-name prefix filter applied to local files and remote keys alike
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreFilter {
    enabled: bool,
    marker: String,
}

impl IgnoreFilter {
    pub fn new(enabled: bool, marker: impl Into<String>) -> Self {
        Self {
            enabled,
            marker: marker.into(),
        }
    }

    /// Filter that ignores nothing
    pub fn disabled() -> Self {
        Self::new(false, ".")
    }

    /// Filter that ignores dotfiles
    pub fn dotfiles() -> Self {
        Self::new(true, ".")
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns true if a file with this base name is excluded
    pub fn is_ignored_name(&self, name: &str) -> bool {
        self.enabled && !self.marker.is_empty() && name.starts_with(&self.marker)
    }

    /// Returns true if the key's base name is excluded
    pub fn is_ignored_key(&self, key: &ObjectKey) -> bool {
        self.is_ignored_name(key.file_name())
    }
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        Self::disabled()
    }
}

// ============================================================================
// Walk entries
// ============================================================================

/// An eligible regular file found under the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub key: ObjectKey,
    pub absolute_path: PathBuf,
    pub size: u64,
}

// ============================================================================
// LocalTreeWalker
// ============================================================================

/// Walker over the regular files of one local root
#[derive(Debug, Clone)]
pub struct LocalTreeWalker {
    root: PathBuf,
    filter: IgnoreFilter,
}

impl LocalTreeWalker {
    pub fn new(root: impl Into<PathBuf>, filter: IgnoreFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &IgnoreFilter {
        &self.filter
    }

    /// Check that the root exists, is a directory, and can be listed
    ///
    /// # Errors
    /// `SyncError::InvalidLocalPath` describing the first problem found
    pub fn check_root(&self) -> Result<(), SyncError> {
        let invalid = |reason: String| SyncError::InvalidLocalPath {
            path: self.root.clone(),
            reason,
        };

        let metadata = match std::fs::metadata(&self.root) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(invalid("directory does not exist".to_string()))
            }
            Err(e) => return Err(invalid(format!("cannot stat root: {e}"))),
        };

        if !metadata.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }

        std::fs::read_dir(&self.root).map_err(|e| invalid(format!("cannot read directory: {e}")))?;
        Ok(())
    }

    /// Lazily iterate over eligible files
    pub fn entries(&self) -> impl Iterator<Item = Result<WalkEntry, SyncError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |item| self.to_entry(item).transpose())
    }

    /// Returns true when no eligible file exists under the root
    pub fn is_empty(&self) -> Result<bool, SyncError> {
        match self.entries().next() {
            None => Ok(true),
            Some(Ok(_)) => Ok(false),
            Some(Err(e)) => Err(e),
        }
    }

    /// Run the walk on the blocking pool and stream its entries
    ///
    /// At most `buffer` entries are queued ahead of the consumer. Dropping the
    /// stream stops the walk at the next send.
    pub fn stream(self, buffer: usize) -> impl Stream<Item = Result<WalkEntry, SyncError>> + Send {
        let (tx, rx) = mpsc::channel(buffer.max(1));

        tokio::task::spawn_blocking(move || {
            for entry in self.entries() {
                let stop = entry.is_err();
                if tx.blocking_send(entry).is_err() {
                    debug!("walk receiver dropped, stopping walk");
                    return;
                }
                if stop {
                    return;
                }
            }
        });

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
    }

    #[instrument(level = "trace", skip(self, item))]
    fn to_entry(
        &self,
        item: walkdir::Result<walkdir::DirEntry>,
    ) -> Result<Option<WalkEntry>, SyncError> {
        let entry = item.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            SyncError::local_io(path, source)
        })?;

        // Symlinks are never followed, and not yielded either.
        if !entry.file_type().is_file() {
            return Ok(None);
        }

        let name = entry.file_name().to_string_lossy();
        if self.filter.is_ignored_name(&name) {
            debug!(path = %entry.path().display(), "ignored by filter");
            return Ok(None);
        }

        let relative = entry.path().strip_prefix(&self.root).map_err(|_| {
            capysync_core::domain::errors::DomainError::PathNotInRoot(
                entry.path().display().to_string(),
            )
        })?;

        let key = match ObjectKey::from_relative_path(relative) {
            Ok(key) => key,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping file with unrepresentable name");
                return Ok(None);
            }
        };

        let size = entry
            .metadata()
            .map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
                SyncError::local_io(entry.path(), source)
            })?
            .len();

        Ok(Some(WalkEntry {
            key,
            absolute_path: entry.path().to_path_buf(),
            size,
        }))
    }
}

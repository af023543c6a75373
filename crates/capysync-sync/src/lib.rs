//! CapySync Sync - Reconciliation engine
//!
//! Provides one-shot reconciliation of a local directory tree against a
//! bucket:
//! - Paged remote listing into a per-run inventory
//! - Lazy local walk with dotfile filtering
//! - SHA-256 change detection against object metadata
//! - Bounded-concurrency uploads, then deletion of remote-only objects
//! - Bootstrap download when the local tree is empty
//!
//! ## Modules
//!
//! - [`engine`] - Orchestrator driving a run through its state machine
//! - [`lister`] - Paged bucket listing
//! - [`walker`] - Local tree walk and ignore filter
//! - [`hasher`] - Streaming content digests
//! - [`planner`] - Per-key skip/upload/delete decisions
//! - [`executor`] - Uploads, deletions and atomic downloads
//! - [`bootstrap`] - Empty-tree download path
//! - [`retry`] - Exponential backoff for transient remote errors

pub mod bootstrap;
pub mod engine;
pub mod executor;
pub mod hasher;
pub mod lister;
pub mod planner;
pub mod retry;
pub mod walker;

pub use engine::ReconciliationEngine;
pub use retry::RetryPolicy;
pub use walker::{IgnoreFilter, LocalTreeWalker};

use std::path::PathBuf;

use thiserror::Error;

use capysync_core::config::ConfigError;
use capysync_core::domain::errors::DomainError;

/// Errors that end a reconciliation run
#[derive(Debug, Error)]
pub enum SyncError {
    /// Required settings are missing or unusable; no run was attempted
    #[error("Configuration invalid: {0}")]
    ConfigurationInvalid(String),

    /// A remote call failed after all retries
    #[error("Remote unavailable during {operation}: {message}")]
    RemoteUnavailable {
        /// Which remote operation failed, e.g. `list`, `put_object docs/a.txt`
        operation: String,
        message: String,
    },

    /// The local root cannot be used
    #[error("Invalid local path {}: {reason}", path.display())]
    InvalidLocalPath { path: PathBuf, reason: String },

    /// A single local file could not be read, hashed or written
    #[error("Local I/O error on {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled before it finished
    #[error("Run cancelled")]
    Cancelled,

    /// A domain-level error propagated from capysync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SyncError {
    /// Wrap a remote failure, keeping the full error chain in the message
    pub fn remote(operation: impl Into<String>, err: &anyhow::Error) -> Self {
        SyncError::RemoteUnavailable {
            operation: operation.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::LocalIo {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> Self {
        SyncError::ConfigurationInvalid(err.to_string())
    }
}

//! CapySync S3 - S3-compatible object store adapter
//!
//! Provides an async client for:
//! - Paged bucket listing (`ListObjectsV2`)
//! - Object metadata lookups (`HeadObject`)
//! - Whole-object upload, download and deletion
//! - AWS Signature Version 4 request signing
//!
//! Requests use path-style addressing (`{endpoint}/{bucket}/{key}`), which
//! works with AWS as well as MinIO, Ceph and other S3-compatible services.
//!
//! ## Modules
//!
//! - [`client`] - HTTP client for the S3 REST API
//! - [`listing`] - XML response bodies
//! - [`provider`] - `IObjectStore` implementation
//! - [`signing`] - SigV4 canonicalization and signatures

pub mod client;
pub mod listing;
pub mod provider;
pub mod signing;

pub use client::S3Client;
pub use provider::S3ObjectStore;

use std::time::Duration;

use capysync_core::ports::object_store::{RemoteError, RemoteFault};
use thiserror::Error;

/// Errors that can occur when talking to an S3-compatible service
#[derive(Debug, Error)]
pub enum S3Error {
    /// Credentials were missing or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The credentials lack permission, or the signature did not match
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The bucket or key does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service is throttling requests
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Any other rejected request (4xx)
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The endpoint URL cannot be used
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl S3Error {
    /// Whether the request may succeed if sent again
    pub fn fault(&self) -> RemoteFault {
        match self {
            S3Error::TooManyRequests { retry_after } => RemoteFault::Transient {
                retry_after: Some(*retry_after),
            },
            S3Error::ServerError { .. } | S3Error::Rejected { status: 408, .. } => {
                RemoteFault::Transient { retry_after: None }
            }
            S3Error::NetworkError(e) if !(e.is_builder() || e.is_redirect()) => {
                RemoteFault::Transient { retry_after: None }
            }
            _ => RemoteFault::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.fault(), RemoteFault::Transient { .. })
    }
}

impl From<S3Error> for RemoteError {
    fn from(err: S3Error) -> Self {
        RemoteError::new(err.fault(), err)
    }
}

//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid run state transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid object key (empty, absolute, or containing traversal segments)
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Invalid content hash (expected lowercase hex SHA-256)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid bucket name
    #[error("Invalid bucket name: {0}")]
    InvalidBucket(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Path is not within the local root
    #[error("Path not within local root: {0}")]
    PathNotInRoot(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

//! Domain entities and business logic
//!
//! This module contains the core domain types for CapySync:
//! - Newtypes for validated keys, digests and identifiers
//! - Local and remote file records plus the per-run remote inventory
//! - The reconciliation run state machine and its report
//! - Domain-specific error types

pub mod errors;
pub mod inventory;
pub mod newtypes;
pub mod run;

// Re-export commonly used types
pub use errors::DomainError;
pub use inventory::{LocalFileRecord, RemoteInventory, RemoteObjectRecord};
pub use newtypes::*;
pub use run::{PlanAction, ReconciliationRun, RunReport, RunState, UploadReason};

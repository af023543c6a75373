//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the traits the reconciliation engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IObjectStore`] - Bucket listing, metadata lookups and object transfers
//! - [`IProgressObserver`] - Start/stop notifications for a reconciliation run

pub mod object_store;
pub mod progress;

pub use object_store::{IObjectStore, ListedObject, ObjectListPage, RemoteError, RemoteFault};
pub use progress::{IProgressObserver, NoopProgress, RunOutcome};

//! CapySync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ObjectKey`, `ContentHash`, `RemoteInventory`, `ReconciliationRun`
//! - **Port definitions** - Traits for adapters: `IObjectStore`, `IProgressObserver`
//! - **State machine** - Reconciliation run lifecycle
//! - **Configuration** - YAML settings file with environment overrides
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`capysync-s3` for the object store, the CLI for progress).
//! The reconciliation engine in `capysync-sync` drives both.

pub mod config;
pub mod domain;
pub mod ports;

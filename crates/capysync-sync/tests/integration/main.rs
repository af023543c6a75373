//! Integration tests for capysync-sync
//!
//! Runs the reconciliation engine end to end against an in-memory object
//! store and temporary local directories.

mod common;

mod test_bootstrap;
mod test_reconcile;

//! Reconciliation run lifecycle
//!
//! A [`ReconciliationRun`] is the single-use record of one pass of the
//! engine. Its [`RunState`] only moves along the edges below:
//!
//! ```text
//! Idle -> Listing -> Walking -> Deleting -> Completed
//!                 \-> Bootstrapping ------> Completed
//! (any non-terminal state) -> Failed
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ObjectKey, RunId};

// ============================================================================
// Run state
// ============================================================================

/// Phase of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created, nothing done yet
    Idle,
    /// Reading the full remote listing
    Listing,
    /// Local tree was empty; downloading the bucket
    Bootstrapping,
    /// Walking the local tree and uploading new or changed files
    Walking,
    /// Removing remote objects with no local counterpart
    Deleting,
    /// Finished successfully
    Completed,
    /// Aborted on the first error
    Failed,
}

impl RunState {
    /// Returns true for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Returns true if moving from `self` to `target` is a legal edge
    pub fn can_transition_to(&self, target: RunState) -> bool {
        use RunState::*;

        if target == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, target),
            (Idle, Listing)
                | (Listing, Bootstrapping)
                | (Listing, Walking)
                | (Walking, Deleting)
                | (Deleting, Completed)
                | (Bootstrapping, Completed)
        )
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Idle
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Listing => "listing",
            RunState::Bootstrapping => "bootstrapping",
            RunState::Walking => "walking",
            RunState::Deleting => "deleting",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Plan actions
// ============================================================================

/// Why a file is being uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadReason {
    /// No remote object exists at the key
    New,
    /// The remote digest differs, is missing, or could not be read
    Changed,
}

/// Decision for a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Skip,
    Upload(UploadReason),
    Delete,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanAction::Skip => write!(f, "skip"),
            PlanAction::Upload(UploadReason::New) => write!(f, "upload (new)"),
            PlanAction::Upload(UploadReason::Changed) => write!(f, "upload (changed)"),
            PlanAction::Delete => write!(f, "delete"),
        }
    }
}

// ============================================================================
// Reconciliation run
// ============================================================================

/// Single-use record of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationRun {
    id: RunId,
    state: RunState,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    failure: Option<String>,
}

impl ReconciliationRun {
    /// Creates a new run in `Idle`
    pub fn new() -> Self {
        Self {
            id: RunId::new(),
            state: RunState::Idle,
            started_at: Utc::now(),
            finished_at: None,
            failure: None,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Reason recorded by [`fail`](Self::fail), if any
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Elapsed time, up to now for a run still in progress
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// Move to `target`, rejecting edges not in the lifecycle graph
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` for an illegal transition
    pub fn transition_to(&mut self, target: RunState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        self.state = target;
        if target.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn begin_listing(&mut self) -> Result<(), DomainError> {
        self.transition_to(RunState::Listing)
    }

    pub fn begin_bootstrap(&mut self) -> Result<(), DomainError> {
        self.transition_to(RunState::Bootstrapping)
    }

    pub fn begin_walking(&mut self) -> Result<(), DomainError> {
        self.transition_to(RunState::Walking)
    }

    pub fn begin_deleting(&mut self) -> Result<(), DomainError> {
        self.transition_to(RunState::Deleting)
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition_to(RunState::Completed)
    }

    /// Mark the run failed with a reason
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if the run already finished
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(RunState::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }
}

impl Default for ReconciliationRun {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Run report
// ============================================================================

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub state: RunState,
    pub bootstrap: bool,
    pub dry_run: bool,
    pub uploaded: Vec<ObjectKey>,
    pub skipped: Vec<ObjectKey>,
    pub deleted: Vec<ObjectKey>,
    pub downloaded: Vec<ObjectKey>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
}

impl RunReport {
    /// Empty report for the given run
    pub fn new(run: &ReconciliationRun) -> Self {
        Self {
            run_id: run.id(),
            state: run.state(),
            bootstrap: false,
            dry_run: false,
            uploaded: Vec::new(),
            skipped: Vec::new(),
            deleted: Vec::new(),
            downloaded: Vec::new(),
            started_at: run.started_at(),
            finished_at: None,
            duration_ms: 0,
        }
    }

    /// Record the outcome of a plan action for `key`
    pub fn record(&mut self, key: ObjectKey, action: PlanAction) {
        match action {
            PlanAction::Skip => self.skipped.push(key),
            PlanAction::Upload(_) => self.uploaded.push(key),
            PlanAction::Delete => self.deleted.push(key),
        }
    }

    pub fn record_download(&mut self, key: ObjectKey) {
        self.downloaded.push(key);
    }

    /// Copy final state and timing from the run and sort every key list
    pub fn finish(&mut self, run: &ReconciliationRun) {
        self.state = run.state();
        self.finished_at = run.finished_at();
        self.duration_ms = run.duration().num_milliseconds();
        self.uploaded.sort();
        self.skipped.sort();
        self.deleted.sort();
        self.downloaded.sort();
    }

    /// Number of remote mutations and downloads performed
    pub fn transfer_count(&self) -> usize {
        self.uploaded.len() + self.deleted.len() + self.downloaded.len()
    }
}

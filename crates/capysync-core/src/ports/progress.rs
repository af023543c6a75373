//! Progress observer port
//!
//! Receives exactly one `on_start` and one `on_stop` per reconciliation run,
//! whichever way the run ends. Observers are synchronous and must not block.

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::RunId;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// Port trait for run lifecycle notifications
pub trait IProgressObserver: Send + Sync {
    /// Called once when the run begins, before any I/O
    fn on_start(&self, run_id: RunId);

    /// Called once when the run ends, on success, failure or cancellation
    fn on_stop(&self, run_id: RunId, outcome: &RunOutcome);
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl IProgressObserver for NoopProgress {
    fn on_start(&self, _run_id: RunId) {}

    fn on_stop(&self, _run_id: RunId, _outcome: &RunOutcome) {}
}

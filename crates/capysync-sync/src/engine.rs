//! Reconciliation engine
//!
//! The [`ReconciliationEngine`] drives one run of local-to-bucket
//! reconciliation through its state machine.
//!
//! ## Run Flow
//!
//! 1. **Start**: notify the observer, validate the local root
//! 2. **List**: read the complete remote listing into an inventory
//! 3. **Bootstrap** (empty local tree): download every object, then finish
//! 4. **Walk** (otherwise): hash each local file, classify it against the
//!    inventory and upload new or changed files
//! 5. **Delete**: remove remote objects that matched no local file
//!
//! The first error aborts the run. Work already done is not rolled back, and
//! deletion never starts unless every upload succeeded.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::{StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use capysync_core::config::{RunConfig, MAX_CONCURRENT_TRANSFERS};
use capysync_core::domain::inventory::{LocalFileRecord, RemoteInventory};
use capysync_core::domain::newtypes::{ObjectKey, RunId};
use capysync_core::domain::run::{PlanAction, ReconciliationRun, RunReport};
use capysync_core::ports::object_store::IObjectStore;
use capysync_core::ports::progress::{IProgressObserver, NoopProgress, RunOutcome};

use crate::bootstrap;
use crate::executor::TransferExecutor;
use crate::hasher::hash_file;
use crate::lister::list_inventory;
use crate::planner::{plan_deletions, DiffPlanner};
use crate::retry::RetryPolicy;
use crate::walker::{IgnoreFilter, LocalTreeWalker};
use crate::SyncError;

// ============================================================================
// Progress guard
// ============================================================================

/// Fires `on_start` on creation and `on_stop` exactly once on drop
///
/// A run that is dropped mid-flight (its future cancelled, or a panic) still
/// reports a failed stop.
struct ProgressGuard {
    observer: Arc<dyn IProgressObserver>,
    run_id: RunId,
    outcome: Option<RunOutcome>,
}

impl ProgressGuard {
    fn start(observer: Arc<dyn IProgressObserver>, run_id: RunId) -> Self {
        observer.on_start(run_id);
        Self {
            observer,
            run_id,
            outcome: None,
        }
    }

    fn finish(mut self, outcome: RunOutcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| RunOutcome::Failed("run interrupted".to_string()));
        self.observer.on_stop(self.run_id, &outcome);
    }
}

// ============================================================================
// ReconciliationEngine
// ============================================================================

/// One-shot reconciler between a local directory and a bucket
pub struct ReconciliationEngine {
    store: Arc<dyn IObjectStore>,
    config: RunConfig,
    observer: Arc<dyn IProgressObserver>,
    retry: RetryPolicy,
}

impl ReconciliationEngine {
    /// Create an engine; the retry policy is taken from `config.retry`
    pub fn new(store: Arc<dyn IObjectStore>, config: RunConfig) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            store,
            config,
            observer: Arc::new(NoopProgress),
            retry,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Transfer limit actually used, within `1..=MAX_CONCURRENT_TRANSFERS`
    fn concurrency(&self) -> usize {
        self.config
            .max_concurrent_transfers
            .clamp(1, MAX_CONCURRENT_TRANSFERS)
    }

    /// Run one reconciliation
    ///
    /// `local_root` overrides the configured root for this run.
    pub async fn run(&self, local_root: Option<&Path>) -> Result<RunReport, SyncError> {
        self.run_with_cancel(local_root, CancellationToken::new())
            .await
    }

    /// Run one reconciliation that stops early when `cancel` fires
    ///
    /// After cancellation no new transfer starts, transfers already running
    /// finish, deletion is skipped, and the run fails with
    /// `SyncError::Cancelled`.
    pub async fn run_with_cancel(
        &self,
        local_root: Option<&Path>,
        cancel: CancellationToken,
    ) -> Result<RunReport, SyncError> {
        let root = local_root
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.local_root.clone());

        let mut run = ReconciliationRun::new();
        let guard = ProgressGuard::start(Arc::clone(&self.observer), run.id());

        let span = info_span!(
            "reconcile",
            run_id = %run.id(),
            bucket = %self.config.bucket,
            root = %root.display(),
            dry_run = self.config.dry_run,
        );

        let result = self
            .execute(&mut run, &root, &cancel)
            .instrument(span)
            .await;

        match result {
            Ok(report) => {
                info!(
                    run_id = %report.run_id,
                    uploaded = report.uploaded.len(),
                    skipped = report.skipped.len(),
                    deleted = report.deleted.len(),
                    downloaded = report.downloaded.len(),
                    duration_ms = report.duration_ms,
                    "reconciliation completed"
                );
                guard.finish(RunOutcome::Completed);
                Ok(report)
            }
            Err(err) => {
                if let Err(e) = run.fail(err.to_string()) {
                    debug!(error = %e, "run already terminal");
                }
                warn!(run_id = %run.id(), state = %run.state(), error = %err, "reconciliation failed");
                guard.finish(RunOutcome::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut ReconciliationRun,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<RunReport, SyncError> {
        let filter = IgnoreFilter::new(self.config.ignore_dotfiles, self.config.ignore_marker.clone());
        let walker = LocalTreeWalker::new(root, filter.clone());

        let probe = walker.clone();
        blocking(root, move || probe.check_root()).await?;

        let mut report = RunReport::new(run);
        report.dry_run = self.config.dry_run;

        run.begin_listing()?;
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let inventory = list_inventory(self.store.as_ref(), &self.config.bucket, &self.retry).await?;

        let executor = TransferExecutor::new(
            self.store.as_ref(),
            &self.config.bucket,
            &self.retry,
            self.config.dry_run,
        );

        let probe = walker.clone();
        let local_empty = blocking(root, move || probe.is_empty()).await?;

        if local_empty {
            run.begin_bootstrap()?;
            report.bootstrap = true;
            info!(objects = inventory.len(), "local tree is empty, bootstrapping from bucket");

            let downloaded = bootstrap::download_all(
                &executor,
                &inventory,
                root,
                &filter,
                self.concurrency(),
                cancel,
            )
            .await?;
            for key in downloaded {
                report.record_download(key);
            }

            run.complete()?;
            report.finish(run);
            return Ok(report);
        }

        run.begin_walking()?;
        let remaining = self
            .walk_and_upload(walker, inventory, &executor, &mut report, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        run.begin_deleting()?;
        for key in plan_deletions(remaining, &filter) {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            executor.delete(&key).await?;
            report.record(key, PlanAction::Delete);
        }

        run.complete()?;
        report.finish(run);
        Ok(report)
    }

    /// Classify and upload every local file; returns the unmatched inventory
    async fn walk_and_upload(
        &self,
        walker: LocalTreeWalker,
        inventory: RemoteInventory,
        executor: &TransferExecutor<'_>,
        report: &mut RunReport,
        cancel: &CancellationToken,
    ) -> Result<RemoteInventory, SyncError> {
        let concurrency = self.concurrency();
        let inventory = Mutex::new(inventory);
        let outcomes: Mutex<Vec<(ObjectKey, PlanAction)>> = Mutex::new(Vec::new());
        let planner = DiffPlanner::new(
            self.store.as_ref(),
            &self.config.bucket,
            &self.retry,
            self.config.metadata_failure_policy,
        );

        walker
            .stream(concurrency.saturating_mul(2))
            .take_until(cancel.cancelled())
            .try_for_each_concurrent(concurrency, |entry| {
                let inventory = &inventory;
                let outcomes = &outcomes;
                let planner = &planner;
                async move {
                    let hash = hash_file(&entry.absolute_path).await?;
                    let record = LocalFileRecord {
                        key: entry.key,
                        hash,
                        absolute_path: entry.absolute_path,
                        size: entry.size,
                    };

                    let action = planner.classify(&record, inventory).await?;
                    if let PlanAction::Upload(reason) = action {
                        if cancel.is_cancelled() {
                            debug!(key = %record.key, "cancelled before upload");
                            return Ok(());
                        }
                        debug!(key = %record.key, ?reason, "uploading");
                        executor.upload(&record).await?;
                    }

                    outcomes
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .push((record.key, action));
                    Ok(())
                }
            })
            .await?;

        for (key, action) in outcomes.into_inner().unwrap_or_else(|p| p.into_inner()) {
            report.record(key, action);
        }
        Ok(inventory.into_inner().unwrap_or_else(|p| p.into_inner()))
    }
}

/// Run a walker probe on the blocking pool
async fn blocking<T, F>(root: &Path, f: F) -> Result<T, SyncError>
where
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    let root: PathBuf = root.to_path_buf();
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::local_io(root, std::io::Error::other(e)))?
}

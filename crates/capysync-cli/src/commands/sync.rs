//! Sync command - Reconcile a local directory with the bucket
//!
//! Provides the `capysync sync` CLI command which:
//! 1. Loads configuration, environment overrides and flags
//! 2. Creates the S3 adapter and the reconciliation engine
//! 3. Runs one reconciliation, cancelling on Ctrl-C
//! 4. Prints a summary of the run

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use capysync_core::config::Config;
use capysync_core::domain::newtypes::RunId;
use capysync_core::domain::run::RunReport;
use capysync_core::ports::progress::{IProgressObserver, RunOutcome};
use capysync_s3::{S3Client, S3ObjectStore};
use capysync_sync::{ReconciliationEngine, SyncError};

use crate::output::{get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Local directory to reconcile (defaults to sync.root or LOCAL_PATH)
    pub path: Option<PathBuf>,

    /// Show what would be transferred without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip files whose name starts with the ignore marker
    #[arg(long)]
    pub ignore_dotfiles: bool,

    /// Bucket to reconcile against (overrides storage.bucket)
    #[arg(long)]
    pub bucket: Option<String>,
}

impl SyncCommand {
    /// Apply flags on top of the loaded configuration
    fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.path {
            config.sync.root = Some(path.clone());
        }
        if let Some(bucket) = &self.bucket {
            config.storage.bucket = Some(bucket.clone());
        }
        if self.ignore_dotfiles {
            config.sync.ignore_dotfiles = true;
        }
    }

    pub async fn execute(&self, format: OutputFormat, config_path: &Path, quiet: bool) -> Result<()> {
        let formatter = get_formatter(format, quiet);

        let mut config = super::load_config(config_path)?;
        config.apply_process_env();
        self.apply_to(&mut config);

        info!(config_path = %config_path.display(), "Loaded configuration");

        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                formatter.error(&error.to_string());
            }
            anyhow::bail!(
                "Configuration has {} error{}",
                errors.len(),
                plural(errors.len())
            );
        }

        let run_config = config
            .run_config(self.path.as_deref())
            .map_err(SyncError::from)?
            .with_dry_run(self.dry_run);

        let client = S3Client::from_config(&config.storage).context("Failed to create S3 client")?;
        let store = Arc::new(S3ObjectStore::new(client));
        let observer = Arc::new(ConsoleProgress { format, quiet });
        let engine = ReconciliationEngine::new(store, run_config).with_observer(observer);

        if self.dry_run {
            formatter.info("Dry run mode - no changes will be made");
        }

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight transfers");
                interrupt.cancel();
            }
        });

        let result = engine.run_with_cancel(None, cancel).await;
        ctrl_c.abort();

        match result {
            Ok(report) => {
                print_report(&report, format, formatter.as_ref());
                Ok(())
            }
            Err(err) => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "success": false,
                        "cancelled": err.is_cancelled(),
                        "error": err.to_string(),
                    }));
                }
                Err(err).context("Reconciliation failed")
            }
        }
    }
}

/// Reports run start and stop on the console
struct ConsoleProgress {
    format: OutputFormat,
    quiet: bool,
}

impl IProgressObserver for ConsoleProgress {
    fn on_start(&self, run_id: RunId) {
        info!(run_id = %run_id, "Reconciliation started");
        if self.format == OutputFormat::Human && !self.quiet {
            println!("  Reconciling... (run {run_id})");
        }
    }

    fn on_stop(&self, run_id: RunId, outcome: &RunOutcome) {
        info!(run_id = %run_id, outcome = %outcome, "Reconciliation stopped");
        if self.format == OutputFormat::Human && !outcome.is_success() {
            eprintln!("\u{2717} Run {run_id} {outcome}");
        }
    }
}

fn format_duration(ms: i64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}

/// JSON rendering of a finished run
fn report_json(report: &RunReport) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "run_id": report.run_id.to_string(),
        "bootstrap": report.bootstrap,
        "dry_run": report.dry_run,
        "uploaded": report.uploaded,
        "skipped": report.skipped.len(),
        "deleted": report.deleted,
        "downloaded": report.downloaded,
        "duration_ms": report.duration_ms,
    })
}

fn print_report(report: &RunReport, format: OutputFormat, formatter: &dyn OutputFormatter) {
    if matches!(format, OutputFormat::Json) {
        formatter.print_json(&report_json(report));
        return;
    }

    let duration = format_duration(report.duration_ms);
    if report.transfer_count() == 0 {
        formatter.success(&format!("Already up to date ({duration})"));
    } else if report.dry_run {
        formatter.success(&format!("Dry run completed in {duration}"));
    } else {
        formatter.success(&format!("Reconciliation completed in {duration}"));
    }

    let verb = |done: &'static str, planned: &'static str| if report.dry_run { planned } else { done };

    if report.bootstrap {
        let n = report.downloaded.len();
        formatter.info(&format!(
            "{:<16}{n} file{}",
            verb("Downloaded:", "Would download:"),
            plural(n)
        ));
    }
    let n = report.uploaded.len();
    if n > 0 {
        formatter.info(&format!(
            "{:<16}{n} file{}",
            verb("Uploaded:", "Would upload:"),
            plural(n)
        ));
    }
    let n = report.deleted.len();
    if n > 0 {
        formatter.info(&format!(
            "{:<16}{n} object{}",
            verb("Deleted:", "Would delete:"),
            plural(n)
        ));
    }
    let n = report.skipped.len();
    if n > 0 {
        formatter.info(&format!("{:<16}{n} file{}", "Unchanged:", plural(n)));
    }
}

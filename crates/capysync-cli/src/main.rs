//! CapySync CLI - Command-line interface for CapySync
//!
//! Provides commands for:
//! - Reconciling a local directory with an S3 bucket
//! - Viewing, editing and validating configuration
//! - Generating shell completions

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

mod commands;
mod output;

use capysync_core::config::LoggingConfig;
use commands::{completions::CompletionsCommand, config::ConfigCommand, sync::SyncCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "capysync",
    version,
    about = "Mirror a local directory into an S3 bucket"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile a local directory with the bucket
    Sync(SyncCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Pick the log filter directive
///
/// `-v` flags win over `RUST_LOG`, which wins over `logging.level`.
fn filter_directive(verbose: u8, quiet: bool, configured: &str) -> String {
    let from_flags = match verbose {
        0 if quiet => Some("warn"),
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    from_flags
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| configured.to_string())
}

fn init_tracing(cli: &Cli, logging: &LoggingConfig) -> Result<()> {
    let directive = filter_directive(cli.verbose, cli.quiet, &logging.level);

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(&directive));

    let file_layer = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new(&directive)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_file = commands::load_working_dir_env()?;

    let config_path = commands::config_path(cli.config.as_deref());
    let mut startup = commands::load_config(&config_path).unwrap_or_default();
    startup.apply_process_env();
    init_tracing(&cli, &startup.logging)?;
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config_path: &Path = &config_path;

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(format, config_path, cli.quiet).await,
        Commands::Config(cmd) => cmd.execute(format, config_path).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}

//! Config command - View and manage CapySync configuration
//!
//! Provides the `capysync config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON), with secrets redacted
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Writes a default configuration file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use capysync_core::config::{Config, MetadataFailurePolicy};

use crate::output::{get_formatter, plural, OutputFormat};

const REDACTED: &str = "********";

/// Keys accepted by `config set`
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("storage.bucket", "Bucket name"),
    ("storage.endpoint", "S3-compatible endpoint URL"),
    ("storage.region", "Signing region"),
    ("storage.access_key_id", "Access key ID"),
    ("storage.secret_access_key", "Secret access key"),
    ("sync.root", "Local directory to reconcile"),
    ("sync.ignore_dotfiles", "true|false"),
    ("sync.ignore_marker", "Name prefix ignored when ignore_dotfiles is on"),
    ("sync.max_concurrent_transfers", "Concurrent uploads/downloads"),
    ("sync.metadata_failure_policy", "reupload|abort"),
    ("retry.max_retries", "Retries for transient errors"),
    ("retry.base_delay_ms", "Base backoff delay (ms)"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.file", "Log file path"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "storage.bucket")
        key: String,
        /// New value; "none" or "" clears optional keys
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(format, config_path),
            ConfigCommand::Set { key, value } => execute_set(key, value, format, config_path),
            ConfigCommand::Validate => execute_validate(format, config_path),
            ConfigCommand::Init { force } => execute_init(*force, format, config_path),
        }
    }
}

fn execute_show(format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format, false);
    let config = redacted(super::load_config(config_path)?);

    info!(config_path = %config_path.display(), "Showing configuration");

    if matches!(format, OutputFormat::Json) {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_set(key: &str, value: &str, format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format, false);
    let mut config = super::load_config(config_path)?;

    info!(key = %key, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{key}': {e}"));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {name:<32} - {help}"));
            }
        }
        return Err(e);
    }

    // The root may be created after it is configured.
    let errors: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|e| e.field != "sync.root")
        .collect();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "errors": messages,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{key}': {}", messages.join("; ")));
        }
        anyhow::bail!("Configuration not saved");
    }

    config
        .save(config_path)
        .context("Failed to write configuration file")?;

    let shown = if is_secret(key) { REDACTED } else { value };
    if matches!(format, OutputFormat::Json) {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": shown,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {key} = {shown}"));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }
    Ok(())
}

fn execute_validate(format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format, false);

    if !config_path.exists() {
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": config_path.display().to_string(),
                "errors": ["Configuration file not found. Using defaults."],
            }));
        } else {
            formatter.info(&format!(
                "Configuration file not found at {}",
                config_path.display()
            ));
            formatter.info("Run 'capysync config init' to create one.");
        }
        return Ok(());
    }

    let config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {e}")],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {e}"));
                formatter.info(&format!("File: {}", config_path.display()));
            }
            anyhow::bail!("Configuration is invalid");
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if matches!(format, OutputFormat::Json) {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            plural(errors.len())
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Configuration is invalid")
    }
}

fn execute_init(force: bool, format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format, false);

    if config_path.exists() && !force {
        formatter.error(&format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        ));
        anyhow::bail!("Configuration file already exists");
    }

    Config::default()
        .save(config_path)
        .context("Failed to write configuration file")?;

    if matches!(format, OutputFormat::Json) {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Wrote default configuration to {}", config_path.display()));
        formatter.info("Set at least storage.bucket and sync.root before syncing.");
    }
    Ok(())
}

fn is_secret(key: &str) -> bool {
    key == "storage.secret_access_key"
}

/// Copy of `config` that is safe to print
fn redacted(mut config: Config) -> Config {
    if config.storage.secret_access_key.is_some() {
        config.storage.secret_access_key = Some(REDACTED.to_string());
    }
    config
}

/// `None` for "none" or an empty value
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .with_context(|| format!("Expected true or false for {key}"))
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- storage ---
        "storage.bucket" => config.storage.bucket = optional(value),
        "storage.endpoint" => config.storage.endpoint = optional(value),
        "storage.region" => config.storage.region = value.to_string(),
        "storage.access_key_id" => config.storage.access_key_id = optional(value),
        "storage.secret_access_key" => config.storage.secret_access_key = optional(value),

        // --- sync ---
        "sync.root" => config.sync.root = optional(value).map(PathBuf::from),
        "sync.ignore_dotfiles" => config.sync.ignore_dotfiles = parse_bool(key, value)?,
        "sync.ignore_marker" => config.sync.ignore_marker = value.to_string(),
        "sync.max_concurrent_transfers" => {
            config.sync.max_concurrent_transfers = value
                .parse::<usize>()
                .context("Expected a positive integer for sync.max_concurrent_transfers")?;
        }
        "sync.metadata_failure_policy" => {
            config.sync.metadata_failure_policy = value
                .parse::<MetadataFailurePolicy>()
                .map_err(anyhow::Error::msg)?;
        }

        // --- retry ---
        "retry.max_retries" => {
            config.retry.max_retries = value
                .parse::<u32>()
                .context("Expected a non-negative integer for retry.max_retries")?;
        }
        "retry.base_delay_ms" => {
            config.retry.base_delay_ms = value
                .parse::<u64>()
                .context("Expected a positive integer for retry.base_delay_ms")?;
        }

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),
        "logging.file" => config.logging.file = optional(value).map(PathBuf::from),

        _ => anyhow::bail!("Unknown configuration key: {key}"),
    }
    Ok(())
}

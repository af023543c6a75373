//! Configuration module for CapySync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, environment overrides, and a builder
//! pattern for programmatic use.
//!
//! The reconciliation engine never reads this file or the environment itself;
//! callers resolve a [`RunConfig`] with [`Config::run_config`] and hand it over.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::BucketName;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for CapySync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncSettings,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

/// Bucket endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket to mirror the local tree into.
    pub bucket: Option<String>,
    /// Base URL of the S3-compatible service. `None` means AWS for `region`.
    pub endpoint: Option<String>,
    /// Signing region.
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Local directory to reconcile.
    pub root: Option<PathBuf>,
    /// Skip files whose base name starts with `ignore_marker`.
    pub ignore_dotfiles: bool,
    pub ignore_marker: String,
    /// Upper bound on concurrent classify+upload tasks.
    pub max_concurrent_transfers: usize,
    pub metadata_failure_policy: MetadataFailurePolicy,
}

/// Retry settings for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds).
    pub base_delay_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Optional file that receives a copy of every log line.
    pub file: Option<PathBuf>,
}

/// What to do when the remote digest of a matched object cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFailurePolicy {
    /// Treat the object as changed and upload it again.
    #[default]
    Reupload,
    /// Fail the run.
    Abort,
}

impl std::fmt::Display for MetadataFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataFailurePolicy::Reupload => write!(f, "reupload"),
            MetadataFailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

impl std::str::FromStr for MetadataFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reupload" => Ok(MetadataFailurePolicy::Reupload),
            "abort" => Ok(MetadataFailurePolicy::Abort),
            other => Err(format!(
                "unknown metadata failure policy '{other}', expected 'reupload' or 'abort'"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            root: None,
            ignore_dotfiles: false,
            ignore_marker: ".".to_string(),
            max_concurrent_transfers: 4,
            metadata_failure_policy: MetadataFailurePolicy::Reupload,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and saving
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/capysync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("capysync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Environment variables recognised by [`Config::apply_env_overrides`].
pub const ENV_BUCKET: &str = "BUCKET_NAME";
pub const ENV_ENDPOINT: &str = "AWS_ENDPOINT";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_LOCAL_PATH: &str = "LOCAL_PATH";
pub const ENV_IGNORE_DOTS: &str = "SYNC_IGNORE_DOTS";
pub const ENV_DEBUG: &str = "APP_DEBUG";

impl Config {
    /// Override file values with environment variables.
    ///
    /// `lookup` is usually `|name| std::env::var(name).ok()`; tests pass a map.
    /// Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_BUCKET) {
            self.storage.bucket = Some(v);
        }
        if let Some(v) = get(ENV_ENDPOINT) {
            self.storage.endpoint = Some(v);
        }
        if let Some(v) = get(ENV_REGION) {
            self.storage.region = v;
        }
        if let Some(v) = get(ENV_ACCESS_KEY_ID) {
            self.storage.access_key_id = Some(v);
        }
        if let Some(v) = get(ENV_SECRET_ACCESS_KEY) {
            self.storage.secret_access_key = Some(v);
        }
        if let Some(v) = get(ENV_LOCAL_PATH) {
            self.sync.root = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_IGNORE_DOTS) {
            self.sync.ignore_dotfiles = v == "true";
        }
        if let Some(v) = get(ENV_DEBUG) {
            if parse_bool_flag(&v) {
                self.logging.level = "debug".to_string();
            }
        }
    }

    /// [`apply_env_overrides`](Self::apply_env_overrides) against the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env_overrides(|name| std::env::var(name).ok());
    }
}

/// Name of the dotenv file read from the working directory.
pub const ENV_FILE_NAME: &str = ".env";

/// Load `KEY=value` pairs from the dotenv file at `path` into the process
/// environment, replacing variables that are already set.
///
/// Returns `Ok(false)` when the file does not exist.
pub fn load_env_file(path: &Path) -> anyhow::Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    dotenvy::from_path_override(path)
        .with_context(|| format!("Failed to read environment file {}", path.display()))?;
    Ok(true)
}

fn parse_bool_flag(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True")
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.max_concurrent_transfers"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. A missing bucket or
    /// root is not reported here since either may still come from the
    /// environment or the command line.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- storage ---
        if let Some(bucket) = &self.storage.bucket {
            if let Err(e) = BucketName::new(bucket.clone()) {
                errors.push(ValidationError {
                    field: "storage.bucket".into(),
                    message: e.to_string(),
                });
            }
        }
        if let Some(endpoint) = &self.storage.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                errors.push(ValidationError {
                    field: "storage.endpoint".into(),
                    message: format!("must be an http(s) URL, got '{endpoint}'"),
                });
            }
        }
        if self.storage.region.trim().is_empty() {
            errors.push(ValidationError {
                field: "storage.region".into(),
                message: "must not be empty".into(),
            });
        }
        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            errors.push(ValidationError {
                field: "storage.secret_access_key".into(),
                message: "access_key_id and secret_access_key must be set together".into(),
            });
        }

        // --- sync ---
        if let Some(root) = &self.sync.root {
            let root_str = root.to_string_lossy();
            if !root_str.starts_with('~') && !root.is_dir() {
                errors.push(ValidationError {
                    field: "sync.root".into(),
                    message: format!("directory does not exist: {}", root.display()),
                });
            }
        }
        if self.sync.ignore_marker.is_empty() {
            errors.push(ValidationError {
                field: "sync.ignore_marker".into(),
                message: "must not be empty".into(),
            });
        }
        if !(1..=MAX_CONCURRENT_TRANSFERS).contains(&self.sync.max_concurrent_transfers) {
            errors.push(ValidationError {
                field: "sync.max_concurrent_transfers".into(),
                message: format!("must be between 1 and {MAX_CONCURRENT_TRANSFERS}"),
            });
        }

        // --- retry ---
        if self.retry.base_delay_ms == 0 {
            errors.push(ValidationError {
                field: "retry.base_delay_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Upper bound for `sync.max_concurrent_transfers`.
pub const MAX_CONCURRENT_TRANSFERS: usize = 64;

/// Errors while resolving a [`RunConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("Missing required setting: {0}")]
    MissingField(&'static str),

    /// A setting is present but unusable
    #[error("Invalid setting {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Fully resolved settings for a single reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub bucket: BucketName,
    pub local_root: PathBuf,
    pub ignore_dotfiles: bool,
    pub ignore_marker: String,
    pub max_concurrent_transfers: usize,
    pub metadata_failure_policy: MetadataFailurePolicy,
    pub retry: RetryConfig,
    /// Log intended transfers without performing them.
    pub dry_run: bool,
}

impl RunConfig {
    /// Run settings with every optional field at its default.
    pub fn new(bucket: BucketName, local_root: impl Into<PathBuf>) -> Self {
        let sync = SyncSettings::default();
        Self {
            bucket,
            local_root: local_root.into(),
            ignore_dotfiles: sync.ignore_dotfiles,
            ignore_marker: sync.ignore_marker,
            max_concurrent_transfers: sync.max_concurrent_transfers,
            metadata_failure_policy: sync.metadata_failure_policy,
            retry: RetryConfig::default(),
            dry_run: false,
        }
    }

    pub fn with_ignore_dotfiles(mut self, ignore: bool) -> Self {
        self.ignore_dotfiles = ignore;
        self
    }

    pub fn with_max_concurrent_transfers(mut self, n: usize) -> Self {
        self.max_concurrent_transfers = n;
        self
    }

    pub fn with_metadata_failure_policy(mut self, policy: MetadataFailurePolicy) -> Self {
        self.metadata_failure_policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Config {
    /// Resolve the settings for one run.
    ///
    /// `root_override` takes precedence over `sync.root`.
    ///
    /// # Errors
    /// `ConfigError::MissingField` when no bucket or root is configured,
    /// `ConfigError::Invalid` for an unusable bucket name or concurrency.
    pub fn run_config(&self, root_override: Option<&Path>) -> Result<RunConfig, ConfigError> {
        let bucket = self
            .storage
            .bucket
            .clone()
            .ok_or(ConfigError::MissingField("storage.bucket"))?;
        let bucket = BucketName::new(bucket).map_err(|e| ConfigError::Invalid {
            field: "storage.bucket".to_string(),
            message: e.to_string(),
        })?;

        let root = root_override
            .map(Path::to_path_buf)
            .or_else(|| self.sync.root.clone())
            .ok_or(ConfigError::MissingField("sync.root"))?;

        if !(1..=MAX_CONCURRENT_TRANSFERS).contains(&self.sync.max_concurrent_transfers) {
            return Err(ConfigError::Invalid {
                field: "sync.max_concurrent_transfers".to_string(),
                message: format!("must be between 1 and {MAX_CONCURRENT_TRANSFERS}"),
            });
        }

        Ok(RunConfig {
            bucket,
            local_root: root,
            ignore_dotfiles: self.sync.ignore_dotfiles,
            ignore_marker: self.sync.ignore_marker.clone(),
            max_concurrent_transfers: self.sync.max_concurrent_transfers,
            metadata_failure_policy: self.sync.metadata_failure_policy,
            retry: self.retry.clone(),
            dry_run: false,
        })
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- storage ---

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.storage.bucket = Some(bucket.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.storage.endpoint = Some(endpoint.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.storage.region = region.into();
        self
    }

    pub fn credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.config.storage.access_key_id = Some(access_key_id.into());
        self.config.storage.secret_access_key = Some(secret_access_key.into());
        self
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = Some(root);
        self
    }

    pub fn ignore_dotfiles(mut self, ignore: bool) -> Self {
        self.config.sync.ignore_dotfiles = ignore;
        self
    }

    pub fn max_concurrent_transfers(mut self, n: usize) -> Self {
        self.config.sync.max_concurrent_transfers = n;
        self
    }

    pub fn metadata_failure_policy(mut self, policy: MetadataFailurePolicy) -> Self {
        self.config.sync.metadata_failure_policy = policy;
        self
    }

    // --- retry ---

    pub fn retry(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.config.retry = RetryConfig {
            max_retries,
            base_delay_ms,
        };
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

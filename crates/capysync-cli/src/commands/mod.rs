//! CLI command implementations

pub mod completions;
pub mod config;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use capysync_core::config::{load_env_file, Config, ENV_FILE_NAME};

/// Config file to use: `--config` if given, else the platform default
pub fn config_path(override_path: Option<&str>) -> PathBuf {
    override_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

/// Load the config file at `path`, or defaults if it does not exist
///
/// A file that exists but does not parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("Failed to parse configuration {}", path.display()))
}

/// Load `.env` from the working directory into the process environment
///
/// Returns the path when a file was found. Its values replace variables
/// already set in the shell.
pub fn load_working_dir_env() -> Result<Option<PathBuf>> {
    let dir = std::env::current_dir().context("Failed to resolve working directory")?;
    env_file_in(&dir)
}

fn env_file_in(dir: &Path) -> Result<Option<PathBuf>> {
    let path = dir.join(ENV_FILE_NAME);
    Ok(load_env_file(&path)?.then_some(path))
}

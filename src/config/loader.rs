// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawTaskConfiguration, TaskConfiguration};
use crate::errors::Result;

/// Load a task file from a given path and return the raw
/// `RawTaskConfiguration`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawTaskConfiguration> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Parse task TOML held in memory.
pub fn parse_str(contents: &str) -> Result<RawTaskConfiguration> {
    let config: RawTaskConfiguration = toml::from_str(contents)?;
    Ok(config)
}

/// Load a task file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks the launch path, arguments, environment and stream placement.
/// - Normalizes an empty `acceptable_exit_codes` to `[0]`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<TaskConfiguration> {
    let raw_config = load_from_path(&path)?;
    let config = TaskConfiguration::try_from(raw_config)?;
    Ok(config)
}

/// Default task file looked up by the CLI when `--config` is not given and
/// no program was passed on the command line.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Proctask.toml")
}

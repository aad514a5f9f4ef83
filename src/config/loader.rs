// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable that overrides [`default_config_path`].
pub const CONFIG_ENV_VAR: &str = "RENDERTRACK_CONFIG";

/// Read and deserialize a configuration file, without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Read a configuration file and turn it into a validated [`ConfigFile`].
///
/// Defaults are applied during deserialization; validation then checks the
/// job list, durations, patterns and estimator settings.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `$RENDERTRACK_CONFIG` if set, `Rendertrack.toml` in the working directory
/// otherwise.
pub fn default_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("Rendertrack.toml"),
    }
}

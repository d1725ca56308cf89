// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load, validate, and resolve relative paths against the file's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config.relative_to(&config_root_dir(path)))
}

/// Resolve the config for the CLI.
///
/// An explicit `--config` must exist. Without one, `Vaultflow.toml` in the
/// working directory is used when present, and built-in defaults otherwise.
pub fn load_for_cli(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let path = default_config_path();
    if path.exists() {
        return load_and_validate(&path);
    }

    info!("no {:?} found; using built-in defaults", path);
    let config = ConfigFile::try_from(RawConfigFile::default())?;
    Ok(config.relative_to(&config_root_dir(&path)))
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Vaultflow.toml")
}

/// Directory relative paths in the config are resolved against.
///
/// A bare file name (parent = "") means the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

// src/errors.rs

//! Crate-wide error type, its classification, and the `Result` alias.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("front matter error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Network / collaborator failure that is expected to resolve by itself.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Destination of a stage transition already exists.
    #[error("conflict: {to:?} already exists (moving {from:?})")]
    Conflict { from: PathBuf, to: PathBuf },

    /// Source and destination live on different filesystems.
    #[error("cross-device move refused: {from:?} -> {to:?}")]
    CrossDevice { from: PathBuf, to: PathBuf },

    /// The supervisor could not start a process.
    #[error("failed to launch '{name}': {reason}")]
    Launch { name: String, reason: String },

    /// A collaborator is missing credentials / configuration and is disabled.
    #[error("collaborator '{collaborator}' is not configured: {reason}")]
    Configuration {
        collaborator: String,
        reason: String,
    },

    #[error("unknown command type: {0}")]
    UnknownCommand(String),

    /// A collaborator answered with an explicit error payload.
    #[error("collaborator rejected command: {0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification used by retry policies and by callers that need to
/// decide whether an error is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Conflict,
    Launch,
    Configuration,
    UnknownCommand,
    Rejected,
    Io,
    Invalid,
    Other,
}

/// Anything a [`crate::retry::RetryPolicy`] can classify.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for VaultflowError {
    fn kind(&self) -> ErrorKind {
        match self {
            VaultflowError::Transient(_) => ErrorKind::Transient,
            VaultflowError::Conflict { .. } => ErrorKind::Conflict,
            VaultflowError::Launch { .. } => ErrorKind::Launch,
            VaultflowError::Configuration { .. } => ErrorKind::Configuration,
            VaultflowError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            VaultflowError::Rejected(_) => ErrorKind::Rejected,
            VaultflowError::IoError(_) | VaultflowError::CrossDevice { .. } => ErrorKind::Io,
            VaultflowError::ConfigError(_)
            | VaultflowError::TomlError(_)
            | VaultflowError::JsonError(_)
            | VaultflowError::YamlError(_) => ErrorKind::Invalid,
            VaultflowError::Other(_) => ErrorKind::Other,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, VaultflowError>;

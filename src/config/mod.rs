// src/config/mod.rs

//! `Vaultflow.toml`: raw serde model, loader, and validation into
//! [`model::ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_for_cli, load_from_path};
pub use model::{ConfigFile, RawConfigFile, SupervisorSettings};

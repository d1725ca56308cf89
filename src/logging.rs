// src/logging.rs

//! `tracing` subscriber setup.
//!
//! The level comes from `--log-level`, else from `VAULTFLOW_LOG`, else
//! `info`. Output goes to stderr so `vaultflow check` stays pipeable.

use std::str::FromStr;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "VAULTFLOW_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = cli_level
        .map(Level::from)
        .or_else(|| std::env::var(LOG_ENV_VAR).ok().and_then(|s| level_from_env(&s)))
        .unwrap_or(Level::INFO);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

fn level_from_env(raw: &str) -> Option<Level> {
    match raw.trim() {
        s if s.eq_ignore_ascii_case("warning") => Some(Level::WARN),
        s => Level::from_str(s).ok(),
    }
}

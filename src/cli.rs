// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `vaultflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vaultflow",
    version,
    about = "File-based workflow orchestrator with a process watchdog.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Vaultflow.toml` in the current working directory if it
    /// exists, built-in defaults otherwise.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `VAULTFLOW_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the orchestrator: ingest items, execute approvals, fire reports.
    Run {
        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,
    },
    /// Run the process supervisor.
    Watchdog {
        /// Poll once and exit.
        #[arg(long)]
        once: bool,
    },
    /// Parse + validate the config and print it, without doing anything.
    Check,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// src/supervisor/alert.rs

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{error, warn};

/// Human-alert channel.
pub trait AlertSink: Send + Sync {
    fn alert(&self, process: &str, message: &str) -> Result<()>;
}

/// Emits alerts as `warn!` events.
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, process: &str, message: &str) -> Result<()> {
        warn!(process = %process, "ALERT: {message}");
        Ok(())
    }
}

/// Appends one line per alert to a file.
#[derive(Debug, Clone)]
pub struct FileAlertSink {
    path: PathBuf,
}

impl FileAlertSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AlertSink for FileAlertSink {
    fn alert(&self, process: &str, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening alert file {:?}", self.path))?;
        writeln!(
            file,
            "{} [{process}] {message}",
            Local::now().format("%Y-%m-%dT%H:%M:%S")
        )
        .with_context(|| format!("writing alert file {:?}", self.path))?;
        Ok(())
    }
}

/// Deliver to every sink; a failing sink does not stop the others.
pub fn raise(sinks: &[Box<dyn AlertSink>], process: &str, message: &str) {
    for sink in sinks {
        if let Err(e) = sink.alert(process, message) {
            error!(process = %process, error = %e, "failed to deliver alert");
        }
    }
}

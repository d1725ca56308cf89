// src/supervisor/registry.rs

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::supervisor::launcher::ProcessHandle;

/// Static description of one supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub name: String,
    /// Identifies the process in the OS process table.
    pub cmd: Vec<String>,
    /// Started when the process is found missing. Usually equal to `cmd`.
    pub restart_cmd: Vec<String>,
    pub working_dir: PathBuf,
    pub auto_restart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Not polled yet.
    #[default]
    Unknown,
    Running,
    /// Found missing; a launch was attempted (or failed) and is being watched.
    Restarting,
    /// Missing and not allowed to restart. Stays here until the process shows
    /// up again on its own.
    Down,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Unknown => "unknown",
            ProcessState::Running => "running",
            ProcessState::Restarting => "restarting",
            ProcessState::Down => "down",
        };
        f.write_str(s)
    }
}

/// A registry entry plus what the supervisor has observed about it.
pub struct SupervisedProcess {
    pub spec: ProcessSpec,
    pub state: ProcessState,
    pub last_seen: Option<DateTime<Local>>,
    /// Child started by this supervisor, if any.
    pub(crate) handle: Option<Box<dyn ProcessHandle>>,
}

impl fmt::Debug for SupervisedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisedProcess")
            .field("spec", &self.spec)
            .field("state", &self.state)
            .field("last_seen", &self.last_seen)
            .field("handle_pid", &self.handle.as_ref().and_then(|h| h.pid()))
            .finish()
    }
}

impl SupervisedProcess {
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            state: ProcessState::Unknown,
            last_seen: None,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

// src/supervisor/launcher.rs

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::errors::{Result, VaultflowError};
use crate::supervisor::registry::ProcessSpec;

/// A child started by the supervisor.
pub trait ProcessHandle: Send {
    fn pid(&self) -> Option<u32>;

    /// Whether the child is still running. Reaps it if it has exited.
    fn is_running(&mut self) -> bool;
}

/// Starts a process from its `restart_cmd`.
pub trait Launcher: Send + Sync {
    fn launch(&self, spec: &ProcessSpec) -> Result<Box<dyn ProcessHandle>>;
}

/// Spawns real OS processes with `tokio::process`.
///
/// Must be called from within a tokio runtime. Children outlive the
/// supervisor: they are not killed when their handle is dropped.
#[derive(Debug, Clone, Default)]
pub struct TokioLauncher;

impl Launcher for TokioLauncher {
    fn launch(&self, spec: &ProcessSpec) -> Result<Box<dyn ProcessHandle>> {
        let Some((program, args)) = spec.restart_cmd.split_first() else {
            return Err(VaultflowError::Launch {
                name: spec.name.clone(),
                reason: "empty restart command".to_string(),
            });
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        let child = cmd.spawn().map_err(|e| VaultflowError::Launch {
            name: spec.name.clone(),
            reason: format!("{program}: {e}"),
        })?;

        info!(
            process = %spec.name,
            pid = ?child.id(),
            cwd = ?spec.working_dir,
            "launched process"
        );
        Ok(Box::new(ChildHandle {
            name: spec.name.clone(),
            child,
        }))
    }
}

struct ChildHandle {
    name: String,
    child: Child,
}

impl ProcessHandle for ChildHandle {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(process = %self.name, %status, "launched process exited");
                false
            }
            Err(e) => {
                debug!(process = %self.name, error = %e, "cannot query launched process");
                false
            }
        }
    }
}

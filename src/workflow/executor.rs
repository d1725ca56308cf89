// src/workflow/executor.rs

//! Execution collaborators for approved commands.
//!
//! The store talks to an [`ExecutorRegistry`] which routes each
//! [`ActionCommand`] to the [`ActionExecutor`] registered for its
//! [`CommandFamily`]. A family without an executor is reported as
//! [`VaultflowError::Configuration`]: that path is disabled, everything else
//! keeps running.
//!
//! The production executor, [`ExternalCommandExecutor`], runs a configured
//! program, writes the command as JSON to its stdin and reads a JSON response
//! from its stdout. A response carrying an `error` field is an error payload.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, VaultflowError};
use crate::retry::RetryPolicy;
use crate::workflow::command::{ActionCommand, CommandFamily};

pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Something that can carry out an approved command.
pub trait ActionExecutor: Send + Sync {
    /// Execute the command, returning the collaborator's success payload.
    fn execute<'a>(&'a self, command: &'a ActionCommand) -> ExecFuture<'a>;
}

/// How to launch an external collaborator program.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSpec {
    pub family: CommandFamily,
    pub cmd: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ExternalCommandExecutor {
    spec: ExecutorSpec,
}

impl ExternalCommandExecutor {
    pub fn new(spec: ExecutorSpec) -> Self {
        Self { spec }
    }

    async fn run(&self, command: &ActionCommand) -> Result<Value> {
        let Some((program, args)) = self.spec.cmd.split_first() else {
            return Err(VaultflowError::Configuration {
                collaborator: self.spec.family.to_string(),
                reason: "empty command".to_string(),
            });
        };

        let payload = serde_json::to_vec(command)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&self.spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.spec.working_dir {
            cmd.current_dir(dir);
        }

        debug!(
            family = %self.spec.family,
            command = command.type_name(),
            program = %program,
            "starting collaborator process"
        );

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                VaultflowError::Configuration {
                    collaborator: self.spec.family.to_string(),
                    reason: format!("cannot start '{program}': {e}"),
                }
            }
            _ => VaultflowError::Transient(format!("spawning '{program}': {e}")),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| VaultflowError::Transient(format!("writing command: {e}")))?;
        }

        let output = match tokio::time::timeout(self.spec.timeout, child.wait_with_output()).await
        {
            Ok(res) => {
                res.map_err(|e| VaultflowError::Transient(format!("waiting for '{program}': {e}")))?
            }
            Err(_) => {
                return Err(VaultflowError::Transient(format!(
                    "'{program}' timed out after {:?}",
                    self.spec.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VaultflowError::Transient(format!(
                "'{program}' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        interpret_response(&output.stdout)
    }
}

impl ActionExecutor for ExternalCommandExecutor {
    fn execute<'a>(&'a self, command: &'a ActionCommand) -> ExecFuture<'a> {
        Box::pin(self.run(command))
    }
}

/// Turn a collaborator's stdout into a success or error payload.
pub fn interpret_response(stdout: &[u8]) -> Result<Value> {
    let value: Value = serde_json::from_slice(stdout).map_err(|e| {
        VaultflowError::Transient(format!("collaborator returned invalid JSON: {e}"))
    })?;

    match value.get("error") {
        None | Some(Value::Null) => Ok(value),
        Some(Value::String(msg)) => Err(VaultflowError::Rejected(msg.clone())),
        Some(other) => Err(VaultflowError::Rejected(other.to_string())),
    }
}

/// Routes commands to executors by family, under a retry policy.
pub struct ExecutorRegistry {
    executors: BTreeMap<CommandFamily, Box<dyn ActionExecutor>>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("families", &self.executors.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            executors: BTreeMap::new(),
            policy,
        }
    }

    pub fn with_executor(
        mut self,
        family: CommandFamily,
        executor: impl ActionExecutor + 'static,
    ) -> Self {
        self.executors.insert(family, Box::new(executor));
        self
    }

    pub fn families(&self) -> impl Iterator<Item = CommandFamily> + '_ {
        self.executors.keys().copied()
    }

    pub async fn dispatch(&self, command: &ActionCommand) -> Result<Value> {
        let family = command.family();
        let executor = self
            .executors
            .get(&family)
            .ok_or_else(|| VaultflowError::Configuration {
                collaborator: family.to_string(),
                reason: "no executor configured".to_string(),
            })?;

        let result = self
            .policy
            .run(command.type_name(), || executor.execute(command))
            .await?;

        info!(
            family = %family,
            command = command.type_name(),
            "collaborator executed command"
        );
        Ok(result)
    }
}

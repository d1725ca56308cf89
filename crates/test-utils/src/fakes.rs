//! Test doubles for the seams the engine talks through.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use vaultflow::errors::{Result, VaultflowError};
use vaultflow::supervisor::{
    AlertSink, Launcher, ProcessHandle, ProcessInfo, ProcessSpec, ProcessTable,
};
use vaultflow::workflow::executor::ExecFuture;
use vaultflow::workflow::{ActionCommand, ActionExecutor};

/// Process table whose contents the test controls.
#[derive(Clone, Default)]
pub struct FakeProcessTable {
    procs: Arc<Mutex<Vec<ProcessInfo>>>,
    broken: Arc<Mutex<bool>>,
}

impl FakeProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, pid: u32, argv: &[&str]) {
        self.procs.lock().unwrap().push(ProcessInfo::from_argv(
            pid,
            argv.iter().map(|s| s.to_string()).collect(),
        ));
    }

    pub fn clear(&self) {
        self.procs.lock().unwrap().clear();
    }

    /// Make every snapshot fail until reset.
    pub fn set_broken(&self, broken: bool) {
        *self.broken.lock().unwrap() = broken;
    }
}

impl ProcessTable for FakeProcessTable {
    fn snapshot(&self) -> anyhow::Result<Vec<ProcessInfo>> {
        if *self.broken.lock().unwrap() {
            anyhow::bail!("process table unavailable");
        }
        Ok(self.procs.lock().unwrap().clone())
    }
}

/// Records launches; launched children run until `stop_all`.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    launches: Arc<Mutex<Vec<String>>>,
    running: Arc<Mutex<bool>>,
    fail: Arc<Mutex<bool>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Every child launched so far exits.
    pub fn stop_all(&self) {
        *self.running.lock().unwrap() = false;
    }
}

struct FakeHandle {
    running: Arc<Mutex<bool>>,
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn is_running(&mut self) -> bool {
        *self.running.lock().unwrap()
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, spec: &ProcessSpec) -> Result<Box<dyn ProcessHandle>> {
        self.launches.lock().unwrap().push(spec.name.clone());
        if *self.fail.lock().unwrap() {
            return Err(VaultflowError::Launch {
                name: spec.name.clone(),
                reason: "fake launch failure".to_string(),
            });
        }
        *self.running.lock().unwrap() = true;
        Ok(Box::new(FakeHandle {
            running: Arc::clone(&self.running),
        }))
    }
}

/// Keeps every alert as `"<process>: <message>"`.
#[derive(Clone, Default)]
pub struct RecordingAlertSink {
    alerts: Arc<Mutex<Vec<String>>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingAlertSink {
    fn alert(&self, process: &str, message: &str) -> anyhow::Result<()> {
        self.alerts
            .lock()
            .unwrap()
            .push(format!("{process}: {message}"));
        Ok(())
    }
}

/// Scripted answer of a [`FakeExecutor`].
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    Success(Value),
    Transient(String),
    Rejected(String),
}

/// Executor that records commands and answers from a script.
///
/// Once the script runs out every call succeeds with `{"ok": true}`.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    calls: Arc<Mutex<Vec<String>>>,
    script: Arc<Mutex<VecDeque<FakeOutcome>>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, outcome: FakeOutcome) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Command types executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ActionExecutor for FakeExecutor {
    fn execute<'a>(&'a self, command: &'a ActionCommand) -> ExecFuture<'a> {
        self.calls
            .lock()
            .unwrap()
            .push(command.type_name().to_string());
        let next = self.script.lock().unwrap().pop_front();

        Box::pin(async move {
            match next {
                None => Ok(json!({"ok": true})),
                Some(FakeOutcome::Success(v)) => Ok(v),
                Some(FakeOutcome::Transient(msg)) => Err(VaultflowError::Transient(msg)),
                Some(FakeOutcome::Rejected(msg)) => Err(VaultflowError::Rejected(msg)),
            }
        })
    }
}

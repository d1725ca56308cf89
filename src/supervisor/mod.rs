// src/supervisor/mod.rs

//! Watchdog for the long-running producer processes.
//!
//! Each [`Supervisor::poll`] takes one process-table snapshot and walks the
//! registry:
//!
//! - a matching process (or a child we launched that is still running) means
//!   the entry is alive;
//! - a missing `auto_restart` entry gets exactly one launch of its
//!   `restart_cmd` and stays `Restarting` until it is seen alive;
//! - a missing entry without `auto_restart` goes `Down` and raises an alert.
//!
//! The supervisor never matches its own pid, and never launches while a child
//! it started for the same entry is still running.

pub mod alert;
pub mod launcher;
pub mod process_table;
pub mod registry;

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::engine::Ticker;
use crate::errors::Result;
use crate::types::MatchMode;

pub use alert::{AlertSink, FileAlertSink, LogAlertSink};
pub use launcher::{Launcher, ProcessHandle, TokioLauncher};
pub use process_table::{ProcessInfo, ProcessTable, ProcfsTable, PsTable};
pub use registry::{ProcessSpec, ProcessState, SupervisedProcess};

/// What one poll did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub alive: Vec<String>,
    pub launched: Vec<String>,
    pub alerted: Vec<String>,
}

pub struct Supervisor {
    processes: Vec<SupervisedProcess>,
    table: Box<dyn ProcessTable>,
    launcher: Box<dyn Launcher>,
    alerts: Vec<Box<dyn AlertSink>>,
    mode: MatchMode,
    own_pid: u32,
    alert_once_when_down: bool,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("processes", &self.processes)
            .field("mode", &self.mode)
            .field("own_pid", &self.own_pid)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        specs: Vec<ProcessSpec>,
        table: Box<dyn ProcessTable>,
        launcher: Box<dyn Launcher>,
        alerts: Vec<Box<dyn AlertSink>>,
        mode: MatchMode,
    ) -> Self {
        Self {
            processes: specs.into_iter().map(SupervisedProcess::new).collect(),
            table,
            launcher,
            alerts,
            mode,
            own_pid: std::process::id(),
            alert_once_when_down: false,
        }
    }

    /// Treat `pid` as the supervisor's own process. Tests use this to
    /// exercise the self-exclusion rule with a fake table.
    pub fn with_own_pid(mut self, pid: u32) -> Self {
        self.own_pid = pid;
        self
    }

    /// Alert once when a process goes `Down` rather than on every poll it
    /// stays down.
    pub fn with_alert_once_when_down(mut self, once: bool) -> Self {
        self.alert_once_when_down = once;
        self
    }

    pub fn processes(&self) -> &[SupervisedProcess] {
        &self.processes
    }

    pub fn state_of(&self, name: &str) -> Option<ProcessState> {
        self.processes
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.state)
    }

    /// Raise an alert on every configured sink.
    pub fn alert(&self, process: &str, message: &str) {
        alert::raise(&self.alerts, process, message);
    }

    /// Check every registered process once.
    pub fn poll(&mut self, now: DateTime<Local>) -> Result<PollReport> {
        let snapshot = self.table.snapshot()?;
        let mut report = PollReport::default();

        for idx in 0..self.processes.len() {
            let alive = self.is_alive(idx, &snapshot);
            let entry = &mut self.processes[idx];
            let name = entry.spec.name.clone();

            if alive {
                if entry.state != ProcessState::Running {
                    info!(process = %name, previous = %entry.state, "process is running");
                }
                entry.state = ProcessState::Running;
                entry.last_seen = Some(now);
                report.alive.push(name);
                continue;
            }

            if entry.spec.auto_restart {
                warn!(process = %name, state = %entry.state, "process not running; restarting");
                entry.state = ProcessState::Restarting;
                match self.launcher.launch(&entry.spec) {
                    Ok(handle) => {
                        entry.handle = Some(handle);
                        report.launched.push(name);
                    }
                    Err(e) => {
                        error!(process = %name, error = %e, "restart failed");
                        let message = format!("failed to restart {name}: {e}");
                        alert::raise(&self.alerts, &name, &message);
                        report.alerted.push(name);
                    }
                }
            } else if entry.state == ProcessState::Down && self.alert_once_when_down {
                debug!(process = %name, "still down");
            } else {
                entry.state = ProcessState::Down;
                let message = format!("{name} is not running and auto-restart is disabled");
                alert::raise(&self.alerts, &name, &message);
                report.alerted.push(name);
            }
        }

        Ok(report)
    }

    /// Poll until the ticker is cancelled. With `once`, poll a single time.
    ///
    /// A failed poll is alerted and monitoring continues.
    pub async fn run(&mut self, ticker: &Ticker, once: bool) {
        info!(
            processes = self.processes.len(),
            interval = ?ticker.interval(),
            "supervisor started"
        );

        loop {
            match self.poll(Local::now()) {
                Ok(report) => debug!(
                    alive = report.alive.len(),
                    launched = report.launched.len(),
                    alerted = report.alerted.len(),
                    "poll finished"
                ),
                Err(e) => {
                    error!(error = %e, "poll failed");
                    self.alert("supervisor", &format!("poll failed: {e}"));
                }
            }

            if once || !ticker.wait().await {
                break;
            }
        }

        info!("supervisor stopped");
    }

    fn is_alive(&mut self, idx: usize, snapshot: &[ProcessInfo]) -> bool {
        let own_pid = self.own_pid;
        let mode = self.mode;
        let entry = &mut self.processes[idx];

        if let Some(handle) = entry.handle.as_mut() {
            if handle.is_running() {
                return true;
            }
            entry.handle = None;
        }

        snapshot.iter().any(|info| {
            info.pid != own_pid && process_table::matches(&entry.spec.cmd, info, mode)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::errors::VaultflowError;

    #[derive(Clone, Default)]
    struct Table(Arc<Mutex<Vec<ProcessInfo>>>);

    impl ProcessTable for Table {
        fn snapshot(&self) -> anyhow::Result<Vec<ProcessInfo>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    struct Handle(Arc<Mutex<bool>>);

    impl ProcessHandle for Handle {
        fn pid(&self) -> Option<u32> {
            Some(77)
        }
        fn is_running(&mut self) -> bool {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct CountingLauncher {
        launches: Arc<Mutex<Vec<String>>>,
        running: Arc<Mutex<bool>>,
        fail: bool,
    }

    impl Launcher for CountingLauncher {
        fn launch(&self, spec: &ProcessSpec) -> Result<Box<dyn ProcessHandle>> {
            self.launches.lock().unwrap().push(spec.name.clone());
            if self.fail {
                return Err(VaultflowError::Launch {
                    name: spec.name.clone(),
                    reason: "boom".into(),
                });
            }
            *self.running.lock().unwrap() = true;
            Ok(Box::new(Handle(self.running.clone())))
        }
    }

    #[derive(Clone, Default)]
    struct Alerts(Arc<Mutex<Vec<String>>>);

    impl AlertSink for Alerts {
        fn alert(&self, process: &str, message: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(format!("{process}: {message}"));
            Ok(())
        }
    }

    fn spec(name: &str, auto_restart: bool) -> ProcessSpec {
        let cmd = vec!["python3".to_string(), format!("{name}.py")];
        ProcessSpec {
            name: name.to_string(),
            cmd: cmd.clone(),
            restart_cmd: cmd,
            working_dir: PathBuf::from("."),
            auto_restart,
        }
    }

    fn supervisor(
        specs: Vec<ProcessSpec>,
        table: &Table,
        launcher: &CountingLauncher,
        alerts: &Alerts,
    ) -> Supervisor {
        Supervisor::new(
            specs,
            Box::new(table.clone()),
            Box::new(launcher.clone()),
            vec![Box::new(alerts.clone())],
            MatchMode::Contains,
        )
        .with_own_pid(1)
    }

    #[test]
    fn missing_process_is_launched_once() {
        let table = Table::default();
        let launcher = CountingLauncher::default();
        let alerts = Alerts::default();
        let mut sup = supervisor(vec![spec("gmail_watcher", true)], &table, &launcher, &alerts);

        let first = sup.poll(Local::now()).unwrap();
        let second = sup.poll(Local::now()).unwrap();

        assert_eq!(first.launched, vec!["gmail_watcher".to_string()]);
        assert!(second.launched.is_empty());
        assert_eq!(second.alive, vec!["gmail_watcher".to_string()]);
        assert_eq!(launcher.launches.lock().unwrap().len(), 1);
        assert_eq!(sup.state_of("gmail_watcher"), Some(ProcessState::Running));
    }

    #[test]
    fn running_process_is_not_relaunched() {
        let table = Table::default();
        table.0.lock().unwrap().push(ProcessInfo::from_argv(
            500,
            vec!["python3".into(), "/srv/gmail_watcher.py".into()],
        ));
        let launcher = CountingLauncher::default();
        let alerts = Alerts::default();
        let mut sup = supervisor(vec![spec("gmail_watcher", true)], &table, &launcher, &alerts);

        let report = sup.poll(Local::now()).unwrap();

        assert_eq!(report.alive, vec!["gmail_watcher".to_string()]);
        assert!(launcher.launches.lock().unwrap().is_empty());
    }

    #[test]
    fn own_pid_is_never_matched() {
        let table = Table::default();
        table.0.lock().unwrap().push(ProcessInfo::from_cmdline(
            1,
            "vaultflow watchdog python3 gmail_watcher.py",
        ));
        let launcher = CountingLauncher::default();
        let alerts = Alerts::default();
        let mut sup = supervisor(vec![spec("gmail_watcher", true)], &table, &launcher, &alerts);

        let report = sup.poll(Local::now()).unwrap();

        assert_eq!(report.launched, vec!["gmail_watcher".to_string()]);
    }

    #[test]
    fn exited_child_is_relaunched_on_next_poll() {
        let table = Table::default();
        let launcher = CountingLauncher::default();
        let alerts = Alerts::default();
        let mut sup = supervisor(vec![spec("file_watcher", true)], &table, &launcher, &alerts);

        sup.poll(Local::now()).unwrap();
        *launcher.running.lock().unwrap() = false;
        let report = sup.poll(Local::now()).unwrap();

        assert_eq!(report.launched, vec!["file_watcher".to_string()]);
        assert_eq!(launcher.launches.lock().unwrap().len(), 2);
    }

    #[test]
    fn no_auto_restart_alerts_on_every_poll() {
        let table = Table::default();
        let launcher = CountingLauncher::default();
        let alerts = Alerts::default();
        let mut sup = supervisor(vec![spec("whatsapp_watcher", false)], &table, &launcher, &alerts);

        sup.poll(Local::now()).unwrap();
        let second = sup.poll(Local::now()).unwrap();

        assert_eq!(sup.state_of("whatsapp_watcher"), Some(ProcessState::Down));
        assert!(launcher.launches.lock().unwrap().is_empty());
        assert_eq!(second.alerted, vec!["whatsapp_watcher".to_string()]);
        assert_eq!(alerts.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn alert_once_when_down_suppresses_repeats() {
        let table = Table::default();
        let launcher = CountingLauncher::default();
        let alerts = Alerts::default();
        let mut sup = supervisor(vec![spec("whatsapp_watcher", false)], &table, &launcher, &alerts)
            .with_alert_once_when_down(true);

        sup.poll(Local::now()).unwrap();
        sup.poll(Local::now()).unwrap();

        assert_eq!(sup.state_of("whatsapp_watcher"), Some(ProcessState::Down));
        assert_eq!(alerts.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn launch_failure_alerts_and_stays_restarting() {
        let table = Table::default();
        let launcher = CountingLauncher {
            fail: true,
            ..CountingLauncher::default()
        };
        let alerts = Alerts::default();
        let mut sup = supervisor(vec![spec("gmail_watcher", true)], &table, &launcher, &alerts);

        let report = sup.poll(Local::now()).unwrap();

        assert_eq!(report.alerted, vec!["gmail_watcher".to_string()]);
        assert_eq!(sup.state_of("gmail_watcher"), Some(ProcessState::Restarting));
        assert!(alerts.0.lock().unwrap()[0].contains("failed to restart gmail_watcher"));
    }

    #[test]
    fn down_process_recovers_when_seen_again() {
        let table = Table::default();
        let launcher = CountingLauncher::default();
        let alerts = Alerts::default();
        let mut sup = supervisor(vec![spec("whatsapp_watcher", false)], &table, &launcher, &alerts);

        sup.poll(Local::now()).unwrap();
        table
            .0
            .lock()
            .unwrap()
            .push(ProcessInfo::from_cmdline(900, "python3 whatsapp_watcher.py"));
        sup.poll(Local::now()).unwrap();

        assert_eq!(sup.state_of("whatsapp_watcher"), Some(ProcessState::Running));
    }
}

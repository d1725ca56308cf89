// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::ErrorKind;
use crate::retry::RetryPolicy;
use crate::schedule::ScheduledJob;
use crate::supervisor::ProcessSpec;
use crate::types::{MatchMode, ReportKind};
use crate::workflow::executor::ExecutorSpec;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// vault = "AI_Employee_Vault"
/// poll_interval = "30s"
///
/// [executor.accounting]
/// cmd = ["python3", "odoo_bridge.py"]
/// timeout = "20s"
///
/// [job.daily_status]
/// hour = 9
///
/// [supervisor]
/// poll_interval = "60s"
///
/// [process.gmail_watcher]
/// cmd = ["python3", "gmail_watcher.py"]
/// ```
///
/// All sections are optional and have defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub plan: PlanSection,

    /// `[executor.<family>]`, keyed by command family (`accounting`, `social`).
    #[serde(default)]
    pub executor: BTreeMap<String, ExecutorConfig>,

    /// `[job.<id>]` entries override or extend the built-in jobs.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,

    #[serde(default)]
    pub supervisor: SupervisorSection,

    /// `[process.<name>]`: the supervisor registry.
    #[serde(default)]
    pub process: BTreeMap<String, ProcessConfig>,
}

/// `[config]` section: the orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Vault root. Relative paths are resolved against the config file's
    /// directory.
    #[serde(default = "default_vault")]
    pub vault: PathBuf,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Wake the orchestrator early when files land in `Needs_Action` or
    /// `Approved`.
    #[serde(default)]
    pub watch_vault: bool,
}

fn default_vault() -> PathBuf {
    PathBuf::from("AI_Employee_Vault")
}

fn default_poll_interval() -> String {
    "30s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            vault: default_vault(),
            poll_interval: default_poll_interval(),
            watch_vault: false,
        }
    }
}

/// `[retry]` section, applied to collaborator calls and report builders.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay: String,
    #[serde(default = "default_max_delay")]
    pub max_delay: String,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<ErrorKind>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> String {
    "1s".to_string()
}

fn default_max_delay() -> String {
    "60s".to_string()
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_retry_on() -> Vec<ErrorKind> {
    vec![ErrorKind::Transient]
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            backoff_factor: default_backoff_factor(),
            retry_on: default_retry_on(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PlanSection {
    /// Replaces the built-in keyword list when set.
    #[serde(default)]
    pub approval_keywords: Option<Vec<String>>,
}

/// `[executor.<family>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Program and arguments. Receives the command as JSON on stdin.
    pub cmd: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_executor_timeout")]
    pub timeout: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_executor_timeout() -> String {
    "30s".to_string()
}

/// `[job.<id>]` section. Unset fields keep the built-in job's value.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(default)]
    pub report: Option<ReportKind>,
    /// `"sun"`, `"monday"`, ... or `"daily"`.
    #[serde(default)]
    pub weekday: Option<String>,
    #[serde(default)]
    pub hour: Option<u32>,
    #[serde(default)]
    pub minute_window: Option<u32>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorSection {
    #[serde(default = "default_supervisor_interval")]
    pub poll_interval: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Also append alerts to this file.
    #[serde(default)]
    pub alert_file: Option<PathBuf>,
    /// Alert only when a non-restartable process first goes down instead of
    /// on every poll it stays down.
    #[serde(default)]
    pub alert_once_when_down: bool,
}

fn default_supervisor_interval() -> String {
    "60s".to_string()
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            poll_interval: default_supervisor_interval(),
            match_mode: MatchMode::default(),
            alert_file: None,
            alert_once_when_down: false,
        }
    }
}

/// `[process.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    pub cmd: Vec<String>,
    /// Defaults to `cmd`.
    #[serde(default)]
    pub restart_cmd: Option<Vec<String>>,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_true")]
    pub auto_restart: bool,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Validated configuration. Built from [`RawConfigFile`] via `TryFrom`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub vault: PathBuf,
    pub poll_interval: Duration,
    pub watch_vault: bool,
    pub retry: RetryPolicy,
    pub approval_keywords: Vec<String>,
    pub executors: Vec<ExecutorSpec>,
    pub jobs: Vec<ScheduledJob>,
    pub supervisor: SupervisorSettings,
    pub processes: Vec<ProcessSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorSettings {
    pub poll_interval: Duration,
    pub match_mode: MatchMode,
    pub alert_file: Option<PathBuf>,
    pub alert_once_when_down: bool,
}

impl ConfigFile {
    /// Resolve relative paths against `base` (the config file's directory).
    pub fn relative_to(mut self, base: &std::path::Path) -> Self {
        let join = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };

        self.vault = join(self.vault);
        for exec in &mut self.executors {
            exec.working_dir = exec.working_dir.take().map(join);
        }
        self.supervisor.alert_file = self.supervisor.alert_file.take().map(join);
        for process in &mut self.processes {
            process.working_dir = join(std::mem::take(&mut process.working_dir));
        }
        self
    }
}

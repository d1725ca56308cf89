// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use chrono::Weekday;

use crate::config::model::{
    ConfigFile, ExecutorConfig, JobConfig, ProcessConfig, RawConfigFile, RetrySection,
    SupervisorSettings,
};
use crate::errors::{Result, VaultflowError};
use crate::retry::RetryPolicy;
use crate::schedule::{default_jobs, ScheduledJob, Trigger};
use crate::supervisor::ProcessSpec;
use crate::types::parse_duration;
use crate::workflow::executor::ExecutorSpec;
use crate::workflow::{CommandFamily, MarkdownPlanBuilder};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::VaultflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let poll_interval = positive_duration("[config].poll_interval", &raw.config.poll_interval)?;
        let retry = validate_retry(&raw.retry)?;
        let jobs = merge_jobs(&raw)?;

        let approval_keywords = raw
            .plan
            .approval_keywords
            .clone()
            .unwrap_or_else(MarkdownPlanBuilder::default_keywords);

        let mut executors = Vec::new();
        for (family, exec) in &raw.executor {
            executors.push(validate_executor(family, exec)?);
        }

        let supervisor = SupervisorSettings {
            poll_interval: positive_duration(
                "[supervisor].poll_interval",
                &raw.supervisor.poll_interval,
            )?,
            match_mode: raw.supervisor.match_mode,
            alert_file: raw.supervisor.alert_file,
            alert_once_when_down: raw.supervisor.alert_once_when_down,
        };

        let mut processes = Vec::new();
        for (name, process) in &raw.process {
            processes.push(validate_process(name, process)?);
        }

        Ok(ConfigFile {
            vault: raw.config.vault,
            poll_interval,
            watch_vault: raw.config.watch_vault,
            retry,
            approval_keywords,
            executors,
            jobs,
            supervisor,
            processes,
        })
    }
}

fn config_error(msg: impl Into<String>) -> VaultflowError {
    VaultflowError::ConfigError(msg.into())
}

fn positive_duration(field: &str, value: &str) -> Result<Duration> {
    let d = parse_duration(value).map_err(|e| config_error(format!("{field}: {e}")))?;
    if d.is_zero() {
        return Err(config_error(format!("{field} must be greater than zero")));
    }
    Ok(d)
}

fn validate_retry(raw: &RetrySection) -> Result<RetryPolicy> {
    if raw.max_attempts == 0 {
        return Err(config_error("[retry].max_attempts must be >= 1 (got 0)"));
    }
    if !raw.backoff_factor.is_finite() || raw.backoff_factor < 1.0 {
        return Err(config_error(format!(
            "[retry].backoff_factor must be >= 1.0 (got {})",
            raw.backoff_factor
        )));
    }
    let base_delay = parse_duration(&raw.base_delay)
        .map_err(|e| config_error(format!("[retry].base_delay: {e}")))?;
    let max_delay = parse_duration(&raw.max_delay)
        .map_err(|e| config_error(format!("[retry].max_delay: {e}")))?;
    if max_delay < base_delay {
        return Err(config_error(
            "[retry].max_delay must not be smaller than base_delay",
        ));
    }

    Ok(RetryPolicy {
        max_attempts: raw.max_attempts,
        base_delay,
        max_delay,
        backoff_factor: raw.backoff_factor,
        retry_on: raw.retry_on.iter().copied().collect::<HashSet<_>>(),
    })
}

fn validate_executor(family: &str, raw: &ExecutorConfig) -> Result<ExecutorSpec> {
    let family: CommandFamily = family
        .parse()
        .map_err(|e: String| config_error(format!("[executor.{family}]: {e}")))?;
    if raw.cmd.is_empty() {
        return Err(config_error(format!("[executor.{family}].cmd must not be empty")));
    }
    let timeout = positive_duration(&format!("[executor.{family}].timeout"), &raw.timeout)?;

    Ok(ExecutorSpec {
        family,
        cmd: raw.cmd.clone(),
        working_dir: raw.working_dir.clone(),
        timeout,
        env: raw.env.clone(),
    })
}

/// Start from the built-in jobs, then apply `[job.<id>]` entries in order.
fn merge_jobs(raw: &RawConfigFile) -> Result<Vec<ScheduledJob>> {
    let mut jobs = default_jobs();

    for (id, cfg) in &raw.job {
        let existing = jobs.iter().position(|j| &j.id == id);

        if !cfg.enabled {
            if let Some(idx) = existing {
                jobs.remove(idx);
            }
            continue;
        }

        let job = match existing {
            Some(idx) => apply_job_overrides(id, jobs[idx].clone(), cfg)?,
            None => new_job(id, cfg)?,
        };
        validate_trigger(id, &job.trigger)?;

        match existing {
            Some(idx) => jobs[idx] = job,
            None => jobs.push(job),
        }
    }

    Ok(jobs)
}

fn apply_job_overrides(id: &str, mut job: ScheduledJob, cfg: &JobConfig) -> Result<ScheduledJob> {
    if let Some(report) = cfg.report {
        job.report = report;
    }
    if let Some(day) = &cfg.weekday {
        job.trigger.weekday = parse_weekday(id, day)?;
    }
    if let Some(hour) = cfg.hour {
        job.trigger.hour = hour;
    }
    if let Some(window) = cfg.minute_window {
        job.trigger.minute_window = window;
    }
    Ok(job)
}

fn new_job(id: &str, cfg: &JobConfig) -> Result<ScheduledJob> {
    let report = cfg
        .report
        .ok_or_else(|| config_error(format!("[job.{id}] needs `report`")))?;
    let hour = cfg
        .hour
        .ok_or_else(|| config_error(format!("[job.{id}] needs `hour`")))?;
    let weekday = match &cfg.weekday {
        Some(day) => parse_weekday(id, day)?,
        None => None,
    };

    Ok(ScheduledJob::new(
        id,
        Trigger {
            weekday,
            hour,
            minute_window: cfg.minute_window.unwrap_or(5),
        },
        report,
    ))
}

fn parse_weekday(id: &str, s: &str) -> Result<Option<Weekday>> {
    match s.trim().to_lowercase().as_str() {
        "daily" | "any" | "*" => Ok(None),
        other => other
            .parse::<Weekday>()
            .map(Some)
            .map_err(|_| config_error(format!("[job.{id}].weekday: unknown day '{s}'"))),
    }
}

fn validate_trigger(id: &str, trigger: &Trigger) -> Result<()> {
    if trigger.hour > 23 {
        return Err(config_error(format!(
            "[job.{id}].hour must be 0..=23 (got {})",
            trigger.hour
        )));
    }
    if trigger.minute_window == 0 || trigger.minute_window > 60 {
        return Err(config_error(format!(
            "[job.{id}].minute_window must be 1..=60 (got {})",
            trigger.minute_window
        )));
    }
    Ok(())
}

fn validate_process(name: &str, raw: &ProcessConfig) -> Result<ProcessSpec> {
    if raw.cmd.is_empty() {
        return Err(config_error(format!("[process.{name}].cmd must not be empty")));
    }
    let restart_cmd = raw.restart_cmd.clone().unwrap_or_else(|| raw.cmd.clone());
    if restart_cmd.is_empty() {
        return Err(config_error(format!(
            "[process.{name}].restart_cmd must not be empty"
        )));
    }

    Ok(ProcessSpec {
        name: name.to_string(),
        cmd: raw.cmd.clone(),
        restart_cmd,
        working_dir: raw.working_dir.clone(),
        auto_restart: raw.auto_restart,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::types::ReportKind;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.supervisor.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert_eq!(cfg.jobs, default_jobs());
        assert!(cfg.executors.is_empty());
        assert!(cfg.processes.is_empty());
    }

    #[test]
    fn keywords_and_job_overrides_in_one_file() {
        let cfg = parse(
            "[plan]\napproval_keywords = [\"wire\"]\n\n[job.daily_status]\nhour = 10\n\n[supervisor]\nalert_file = \"alerts.log\"\n",
        )
        .unwrap();
        assert_eq!(cfg.approval_keywords, vec!["wire".to_string()]);
        let daily = cfg.jobs.iter().find(|j| j.id == "daily_status").unwrap();
        assert_eq!(daily.trigger.hour, 10);
        assert_eq!(cfg.supervisor.alert_file, Some(PathBuf::from("alerts.log")));
        assert!(!cfg.supervisor.alert_once_when_down);
    }

    #[test]
    fn job_override_keeps_unset_fields() {
        let cfg = parse("[job.daily_status]\nhour = 9\n").unwrap();
        let daily = cfg.jobs.iter().find(|j| j.id == "daily_status").unwrap();
        assert_eq!(daily.trigger.hour, 9);
        assert_eq!(daily.trigger.minute_window, 5);
        assert_eq!(daily.report, ReportKind::DailyStatus);
    }

    #[test]
    fn disabled_job_is_removed() {
        let cfg = parse("[job.weekly_briefing]\nenabled = false\n").unwrap();
        assert!(cfg.jobs.iter().all(|j| j.id != "weekly_briefing"));
    }

    #[test]
    fn new_job_requires_report_and_hour() {
        let err = parse("[job.evening]\nhour = 18\n").unwrap_err();
        assert!(err.to_string().contains("needs `report`"));

        let cfg = parse("[job.evening]\nreport = \"daily_status\"\nhour = 18\nweekday = \"fri\"\n")
            .unwrap();
        let evening = cfg.jobs.iter().find(|j| j.id == "evening").unwrap();
        assert_eq!(evening.trigger.weekday, Some(Weekday::Fri));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse("[config]\npoll_interval = \"0s\"\n").is_err());
        assert!(parse("[retry]\nmax_attempts = 0\n").is_err());
        assert!(parse("[job.daily_status]\nhour = 24\n").is_err());
        assert!(parse("[executor.crm]\ncmd = [\"x\"]\n").is_err());
        assert!(parse("[process.w]\ncmd = []\n").is_err());
    }

    #[test]
    fn process_restart_cmd_defaults_to_cmd() {
        let cfg = parse("[process.gmail_watcher]\ncmd = [\"python3\", \"gmail_watcher.py\"]\n")
            .unwrap();
        let p = &cfg.processes[0];
        assert_eq!(p.restart_cmd, p.cmd);
        assert!(p.auto_restart);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse("[config]\nvualt = \"x\"\n").unwrap_err();
        assert!(matches!(err, VaultflowError::TomlError(_)));
    }
}

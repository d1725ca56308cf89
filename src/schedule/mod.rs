// src/schedule/mod.rs

//! Wall-clock scheduler for recurring reports.
//!
//! A job fires when its [`Trigger`] matches the local time *and* its persisted
//! marker does not already cover today's date. The marker is written only
//! after the report has been published, so a failed job is retried by a later
//! tick in the same window, and a successful one is never repeated, even
//! across restarts.

pub mod markers;
pub mod reports;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use tracing::{debug, error, info};

use crate::errors::{Result, VaultflowError};
use crate::fs::FileSystem;
use crate::retry::RetryPolicy;
use crate::types::ReportKind;
use crate::workflow::{Stage, WorkflowStore};

pub use markers::{FileMarkerStore, MarkerStore, MemoryMarkerStore};
pub use reports::{
    DailyStatusReport, FinanceSource, FinanceSummary, ReportBuilder, ReportContext,
    WeeklyBriefingReport,
};

/// When a job is due: `hour:00 <= t < hour:minute_window`, optionally on one
/// weekday only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub weekday: Option<Weekday>,
    pub hour: u32,
    pub minute_window: u32,
}

impl Trigger {
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        self.weekday.is_none_or(|day| now.weekday() == day)
            && now.hour() == self.hour
            && now.minute() < self.minute_window
    }

    /// The calendar period a firing at `now` belongs to.
    pub fn period(&self, now: NaiveDateTime) -> NaiveDate {
        now.date()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.weekday {
            Some(day) => write!(f, "{day} ")?,
            None => f.write_str("daily ")?,
        }
        write!(
            f,
            "{:02}:00-{:02}:{:02}",
            self.hour, self.hour, self.minute_window
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub id: String,
    pub trigger: Trigger,
    pub report: ReportKind,
}

impl ScheduledJob {
    pub fn new(id: impl Into<String>, trigger: Trigger, report: ReportKind) -> Self {
        Self {
            id: id.into(),
            trigger,
            report,
        }
    }

    /// `<YYYY-MM-DD>_<Suffix>.md`
    pub fn artifact_name(&self, period: NaiveDate) -> String {
        format!("{}_{}.md", period.format("%Y-%m-%d"), self.report.file_suffix())
    }
}

/// Weekly briefing Sunday 07:00-07:05, daily status every day 08:00-08:05.
pub fn default_jobs() -> Vec<ScheduledJob> {
    vec![
        ScheduledJob::new(
            "weekly_briefing",
            Trigger {
                weekday: Some(Weekday::Sun),
                hour: 7,
                minute_window: 5,
            },
            ReportKind::WeeklyBriefing,
        ),
        ScheduledJob::new(
            "daily_status",
            Trigger {
                weekday: None,
                hour: 8,
                minute_window: 5,
            },
            ReportKind::DailyStatus,
        ),
    ]
}

/// Outcome of one [`Scheduler::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fired: Vec<String>,
    pub failed: Vec<String>,
}

pub struct Scheduler {
    fs: Arc<dyn FileSystem>,
    jobs: Vec<ScheduledJob>,
    markers: Box<dyn MarkerStore>,
    builders: HashMap<ReportKind, Box<dyn ReportBuilder>>,
    policy: RetryPolicy,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("jobs", &self.jobs)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Scheduler with the built-in report builders and no finance source.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        jobs: Vec<ScheduledJob>,
        markers: Box<dyn MarkerStore>,
        policy: RetryPolicy,
    ) -> Self {
        let mut builders: HashMap<ReportKind, Box<dyn ReportBuilder>> = HashMap::new();
        builders.insert(ReportKind::DailyStatus, Box::new(DailyStatusReport));
        builders.insert(
            ReportKind::WeeklyBriefing,
            Box::new(WeeklyBriefingReport::new()),
        );
        Self {
            fs,
            jobs,
            markers,
            builders,
            policy,
        }
    }

    pub fn with_builder(mut self, kind: ReportKind, builder: impl ReportBuilder + 'static) -> Self {
        self.builders.insert(kind, Box::new(builder));
        self
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Drop markers of jobs that are no longer configured.
    pub fn prune_markers(&mut self) -> Result<()> {
        let active: Vec<&str> = self.jobs.iter().map(|j| j.id.as_str()).collect();
        self.markers.prune(&active)?;
        Ok(())
    }

    /// Fire every due job. `now` is local wall-clock time.
    ///
    /// Jobs never touch stage folders; they only read counts from `store`.
    pub async fn tick(&mut self, now: NaiveDateTime, store: &WorkflowStore) -> TickReport {
        let mut report = TickReport::default();
        let mut counts = None;

        for idx in 0..self.jobs.len() {
            let job = self.jobs[idx].clone();
            if !job.trigger.matches(now) {
                continue;
            }

            let period = job.trigger.period(now);
            match self.markers.load(&job.id) {
                Ok(Some(last)) if last >= period => {
                    debug!(job = %job.id, period = %period, "already fired for this period");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(job = %job.id, error = %e, "cannot read schedule marker; skipping job");
                    report.failed.push(job.id.clone());
                    continue;
                }
            }

            if counts.is_none() {
                match store.stage_counts() {
                    Ok(c) => counts = Some(c),
                    Err(e) => {
                        error!(job = %job.id, error = %e, "cannot count stage items");
                        report.failed.push(job.id.clone());
                        continue;
                    }
                }
            }
            let ctx = ReportContext {
                now,
                counts: counts.unwrap_or_default(),
            };

            match self.fire(&job, period, &ctx, store).await {
                Ok(()) => {
                    info!(job = %job.id, period = %period, "scheduled job fired");
                    report.fired.push(job.id.clone());
                }
                Err(e) => {
                    error!(job = %job.id, error = %e, "scheduled job failed; will retry within the window");
                    report.failed.push(job.id.clone());
                }
            }
        }

        report
    }

    async fn fire(
        &mut self,
        job: &ScheduledJob,
        period: NaiveDate,
        ctx: &ReportContext,
        store: &WorkflowStore,
    ) -> Result<()> {
        let builder = self.builders.get(&job.report).ok_or_else(|| {
            VaultflowError::ConfigError(format!(
                "no report builder for {:?}",
                job.report
            ))
        })?;

        let content = self
            .policy
            .run(&job.id, || std::future::ready(builder.build(ctx)))
            .await?;

        let path = store
            .layout()
            .stage_dir(Stage::Briefings)
            .join(job.artifact_name(period));
        self.fs.write_atomic(&path, content.as_bytes())?;

        // A crash here rewrites the same artifact on the next tick.
        self.markers.save(&job.id, period)?;
        Ok(())
    }
}

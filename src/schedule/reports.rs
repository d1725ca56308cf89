// src/schedule/reports.rs

//! Report content for scheduled jobs.
//!
//! The scheduler only decides *when* a report is due; a [`ReportBuilder`]
//! turns a [`ReportContext`] into markdown. Financial figures come from an
//! optional [`FinanceSource`].

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::errors::Result;
use crate::workflow::StageCounts;

/// Snapshot handed to a report builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportContext {
    pub now: NaiveDateTime,
    pub counts: StageCounts,
}

impl ReportContext {
    /// Monday and Sunday of the week containing `now`.
    pub fn week_bounds(&self) -> (NaiveDate, NaiveDate) {
        let today = self.now.date();
        let start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        (start, start + Duration::days(6))
    }
}

pub trait ReportBuilder: Send + Sync {
    fn build(&self, ctx: &ReportContext) -> Result<String>;
}

/// Revenue figures for a period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinanceSummary {
    pub revenue: f64,
    pub spent: f64,
    pub transaction_count: usize,
}

impl FinanceSummary {
    pub fn net(&self) -> f64 {
        self.revenue - self.spent
    }
}

/// Supplies financial figures for the weekly briefing, e.g. from the
/// accounting system.
pub trait FinanceSource: Send + Sync {
    fn summary(&self, from: NaiveDate, to: NaiveDate) -> Result<FinanceSummary>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DailyStatusReport;

impl ReportBuilder for DailyStatusReport {
    fn build(&self, ctx: &ReportContext) -> Result<String> {
        Ok(format!(
            "# Daily Status Report - {date}

---
generated: {generated}
---

## Today's Overview
- **Pending Actions**: {pending}
- **Pending Approvals**: {approvals}
- **Approved, awaiting execution**: {approved}
",
            date = ctx.now.format("%Y-%m-%d"),
            generated = ctx.now.format("%Y-%m-%dT%H:%M:%S"),
            pending = ctx.counts.needs_action,
            approvals = ctx.counts.pending_approval,
            approved = ctx.counts.approved,
        ))
    }
}

pub struct WeeklyBriefingReport {
    finance: Option<Box<dyn FinanceSource>>,
}

impl std::fmt::Debug for WeeklyBriefingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeeklyBriefingReport")
            .field("finance", &self.finance.is_some())
            .finish()
    }
}

impl WeeklyBriefingReport {
    pub fn new() -> Self {
        Self { finance: None }
    }

    pub fn with_finance(finance: impl FinanceSource + 'static) -> Self {
        Self {
            finance: Some(Box::new(finance)),
        }
    }
}

impl Default for WeeklyBriefingReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder for WeeklyBriefingReport {
    fn build(&self, ctx: &ReportContext) -> Result<String> {
        let (start, end) = ctx.week_bounds();
        // Finance failure fails the whole report.
        let revenue = match &self.finance {
            Some(source) => revenue_section(&source.summary(start, end)?),
            None => "No finance source configured.\n".to_string(),
        };
        let counts = &ctx.counts;

        Ok(format!(
            "---
generated: {generated}
period: {start} to {end}
---

# Monday Morning CEO Briefing

## Revenue
{revenue}
## Completed Tasks
- {done} tasks completed

## Pipeline
- **Needs Action**: {needs_action}
- **Plans**: {plans}
- **Pending Approval**: {pending_approval}
- **Approved**: {approved}
",
            generated = ctx.now.format("%Y-%m-%dT%H:%M:%S"),
            done = counts.done,
            needs_action = counts.needs_action,
            plans = counts.plans,
            pending_approval = counts.pending_approval,
            approved = counts.approved,
        ))
    }
}

fn revenue_section(summary: &FinanceSummary) -> String {
    let trend = if summary.net() > 0.0 { "Positive" } else { "Negative" };
    format!(
        "- **This Week**: ${revenue:.2}
- **Spent**: ${spent:.2}
- **Net**: ${net:.2}
- **Trend**: {trend}
- **Transactions**: {count}
",
        revenue = summary.revenue,
        spent = summary.spent,
        net = summary.net(),
        count = summary.transaction_count,
    )
}

// src/engine/orchestrator.rs

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::engine::ticker::Ticker;
use crate::errors::Result;
use crate::schedule::{Scheduler, TickReport};
use crate::workflow::{CycleReport, WorkflowStore};

/// Everything one orchestrator cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub ingested: CycleReport,
    pub approvals: CycleReport,
    pub schedule: TickReport,
}

impl CycleSummary {
    pub fn is_idle(&self) -> bool {
        self.ingested == CycleReport::default()
            && self.approvals == CycleReport::default()
            && self.schedule == TickReport::default()
    }
}

/// Drives the workflow store and the scheduler from one loop.
#[derive(Debug)]
pub struct Orchestrator {
    store: WorkflowStore,
    scheduler: Scheduler,
}

impl Orchestrator {
    pub fn new(store: WorkflowStore, scheduler: Scheduler) -> Self {
        Self { store, scheduler }
    }

    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    /// Create the stage folders and drop stale schedule markers.
    pub fn start(&mut self) -> Result<()> {
        self.store.ensure_stage_folders()?;
        if let Err(e) = self.scheduler.prune_markers() {
            warn!(error = %e, "failed to prune stale schedule markers");
        }
        info!(vault = ?self.store.layout().root(), "orchestrator ready");
        Ok(())
    }

    /// Ingest, execute approvals, then fire due jobs.
    ///
    /// Nothing in here aborts the cycle: failures are logged and the next
    /// step still runs. A stop request is honoured between steps.
    pub async fn cycle(&mut self, now: NaiveDateTime, ticker: &Ticker) -> CycleSummary {
        let cancel = ticker.cancel_token();
        let mut summary = CycleSummary::default();

        if let Err(e) = self.store.ensure_stage_folders() {
            error!(error = %e, "cannot create stage folders");
        }

        match self.store.ingest(cancel) {
            Ok(report) => summary.ingested = report,
            Err(e) => error!(error = %e, "ingest pass failed"),
        }
        if cancel.is_cancelled() {
            return summary;
        }

        match self.store.check_approvals(cancel).await {
            Ok(report) => summary.approvals = report,
            Err(e) => error!(error = %e, "approval pass failed"),
        }
        if cancel.is_cancelled() {
            return summary;
        }

        summary.schedule = self.scheduler.tick(now, &self.store).await;
        summary
    }

    /// Run cycles until the ticker is cancelled. With `once`, run a single
    /// cycle and return.
    ///
    /// A vault that cannot be prepared is logged, not fatal: every cycle
    /// tries to create the stage folders again.
    pub async fn run(&mut self, ticker: &Ticker, once: bool) -> Result<()> {
        if let Err(e) = self.start() {
            error!(
                vault = ?self.store.layout().root(),
                error = %e,
                "cannot prepare vault; retrying every cycle"
            );
        }

        loop {
            let summary = self.cycle(Local::now().naive_local(), ticker).await;
            if summary.is_idle() {
                debug!("cycle finished; nothing to do");
            } else {
                info!(
                    ingested = summary.ingested.completed.len(),
                    executed = summary.approvals.completed.len(),
                    conflicts = summary.ingested.conflicts.len() + summary.approvals.conflicts.len(),
                    failed = summary.ingested.failed.len() + summary.approvals.failed.len(),
                    reports = summary.schedule.fired.len(),
                    "cycle finished"
                );
            }

            if once || !ticker.wait().await {
                break;
            }
        }

        info!("orchestrator stopped");
        Ok(())
    }
}

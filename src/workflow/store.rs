// src/workflow/store.rs

//! Stage folders and the transition protocol.
//!
//! Every transition is `exists(dest)?` followed by one atomic rename. The
//! existence check turns a taken destination into a
//! [`VaultflowError::Conflict`] instead of silently replacing the archived
//! file; the rename itself is the only step that changes which folder holds
//! the item. The check and the rename are not one atomic step; only one
//! orchestrator writes into `Done`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{Classify, Result, VaultflowError};
use crate::fs::FileSystem;
use crate::workflow::command::ActionCommand;
use crate::workflow::executor::ExecutorRegistry;
use crate::workflow::plan::{Plan, PlanBuilder};
use crate::workflow::{is_item_file, Stage, VaultLayout, WorkItem};

/// What happened to the items seen in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items that reached their destination stage.
    pub completed: Vec<String>,
    /// Items left in place because the destination name was taken.
    pub conflicts: Vec<String>,
    /// Items left in place because processing failed.
    pub failed: Vec<String>,
    /// True if a stop request cut the pass short.
    pub interrupted: bool,
}

/// Number of items per stage folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub needs_action: usize,
    pub plans: usize,
    pub pending_approval: usize,
    pub approved: usize,
    pub done: usize,
}

pub struct WorkflowStore {
    fs: Arc<dyn FileSystem>,
    layout: VaultLayout,
    planner: Box<dyn PlanBuilder>,
    executors: ExecutorRegistry,
}

impl std::fmt::Debug for WorkflowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowStore")
            .field("layout", &self.layout)
            .field("executors", &self.executors)
            .finish_non_exhaustive()
    }
}

impl WorkflowStore {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        layout: VaultLayout,
        planner: Box<dyn PlanBuilder>,
        executors: ExecutorRegistry,
    ) -> Self {
        Self {
            fs,
            layout,
            planner,
            executors,
        }
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Create any missing stage folder. Existing folders are left alone.
    pub fn ensure_stage_folders(&self) -> Result<()> {
        for stage in Stage::ALL {
            let dir = self.layout.stage_dir(stage);
            if !self.fs.is_dir(&dir) {
                self.fs.create_dir_all(&dir)?;
                info!(stage = %stage, dir = ?dir, "created stage folder");
            }
        }
        Ok(())
    }

    /// Item files currently in `stage`, sorted by name.
    pub fn list_items(&self, stage: Stage) -> Result<Vec<PathBuf>> {
        let dir = self.layout.stage_dir(stage);
        if !self.fs.is_dir(&dir) {
            return Ok(Vec::new());
        }
        let mut items: Vec<PathBuf> = self
            .fs
            .read_dir(&dir)?
            .into_iter()
            .filter(|p| is_item_file(p) && self.fs.is_file(p))
            .collect();
        items.sort();
        Ok(items)
    }

    pub fn stage_counts(&self) -> Result<StageCounts> {
        Ok(StageCounts {
            needs_action: self.list_items(Stage::NeedsAction)?.len(),
            plans: self.list_items(Stage::Plans)?.len(),
            pending_approval: self.list_items(Stage::PendingApproval)?.len(),
            approved: self.list_items(Stage::Approved)?.len(),
            done: self.list_items(Stage::Done)?.len(),
        })
    }

    pub fn read_item(&self, path: &Path, stage: Stage) -> Result<WorkItem> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VaultflowError::ConfigError(format!("unusable file name {:?}", path)))?
            .to_string();
        let content = self.fs.read_to_string(path)?;
        let created: DateTime<Local> = self.fs.modified(path)?.into();
        Ok(WorkItem {
            name,
            path: path.to_path_buf(),
            stage,
            content,
            created,
        })
    }

    /// Move `item` into `to`, keeping its file name.
    pub fn transition(&self, item: &Path, to: Stage) -> Result<PathBuf> {
        let name = item
            .file_name()
            .ok_or_else(|| VaultflowError::ConfigError(format!("unusable file name {:?}", item)))?;
        let dest = self.layout.stage_dir(to).join(name);
        self.ensure_free(item, &dest)?;
        self.fs.rename(item, &dest)?;
        debug!(from = ?item, to = ?dest, "stage transition");
        Ok(dest)
    }

    fn ensure_free(&self, from: &Path, dest: &Path) -> Result<()> {
        if self.fs.exists(dest) {
            return Err(VaultflowError::Conflict {
                from: from.to_path_buf(),
                to: dest.to_path_buf(),
            });
        }
        Ok(())
    }

    fn destination(&self, item: &Path, to: Stage) -> PathBuf {
        let name = item.file_name().unwrap_or(item.as_os_str());
        self.layout.stage_dir(to).join(name)
    }

    /// Plan every intake item and archive it.
    ///
    /// A stop request is honoured between items.
    pub fn ingest(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        let items = self.list_items(Stage::NeedsAction)?;
        let mut report = CycleReport::default();

        if items.is_empty() {
            debug!("no items in {}", Stage::NeedsAction);
            return Ok(report);
        }

        for path in items {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            let name = file_label(&path);
            match self.ingest_one(&path) {
                Ok(plan_name) => {
                    info!(item = %name, plan = %plan_name, "ingested item");
                    report.completed.push(name);
                }
                Err(VaultflowError::Conflict { to, .. }) => {
                    warn!(
                        item = %name,
                        dest = ?to,
                        "archive slot already taken; leaving item for next cycle"
                    );
                    report.conflicts.push(name);
                }
                Err(e) => {
                    error!(item = %name, error = %e, "failed to ingest item");
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }

    fn ingest_one(&self, path: &Path) -> Result<String> {
        let dest = self.destination(path, Stage::Done);
        self.ensure_free(path, &dest)?;

        let item = self.read_item(path, Stage::NeedsAction)?;

        let plan_name = match self.find_plan_for(&item)? {
            Some(existing) => {
                info!(item = %item.name, plan = %existing, "reusing plan from an earlier attempt");
                existing
            }
            None => {
                let plan = self.planner.build(&item, Local::now())?;
                let (plan_name, plan_path) = self.free_plan_path(&plan);
                self.fs.write_atomic(&plan_path, plan.render().as_bytes())?;
                plan_name
            }
        };

        self.transition(path, Stage::Done)?;
        Ok(plan_name)
    }

    /// `PLAN_<stem>_<ts>.md`, or `PLAN_<stem>_<ts>_<n>.md` if another plan
    /// for the same stem was written within the same second.
    fn free_plan_path(&self, plan: &Plan) -> (String, PathBuf) {
        let dir = self.layout.stage_dir(Stage::Plans);
        let mut name = plan.file_name();
        let mut n = 1;
        while self.fs.exists(&dir.join(&name)) {
            name = format!("PLAN_{}_{}_{n}.md", plan.source_stem, plan.created.timestamp());
            n += 1;
        }
        let path = dir.join(&name);
        (name, path)
    }

    /// A plan already written for this item, e.g. by a run that stopped
    /// between writing the plan and archiving the item. Plans of an earlier
    /// item with the same name but different content do not count.
    fn find_plan_for(&self, item: &WorkItem) -> Result<Option<String>> {
        let prefix = format!("PLAN_{}_", item.stem());
        for plan_path in self.list_items(Stage::Plans)? {
            let plan_name = file_label(&plan_path);
            if !plan_name.starts_with(&prefix) {
                continue;
            }
            let text = self.fs.read_to_string(&plan_path)?;
            if Plan::was_made_for(&text, item) {
                return Ok(Some(plan_name));
            }
        }
        Ok(None)
    }

    /// Execute every approved item and archive the ones that succeeded.
    ///
    /// Failed items stay in `Approved` and are tried again next cycle. A stop
    /// request is honoured between items.
    pub async fn check_approvals(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        let items = self.list_items(Stage::Approved)?;
        let mut report = CycleReport::default();

        for path in items {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            let name = file_label(&path);
            match self.execute_one(&path).await {
                Ok(()) => {
                    info!(item = %name, "approved action completed");
                    report.completed.push(name);
                }
                Err(VaultflowError::Conflict { to, .. }) => {
                    warn!(
                        item = %name,
                        dest = ?to,
                        "archive slot already taken; not executing until it is free"
                    );
                    report.conflicts.push(name);
                }
                Err(e) => {
                    error!(item = %name, error = %e, kind = ?e.kind(), "approved action not executed");
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }

    async fn execute_one(&self, path: &Path) -> Result<()> {
        // Check the archive slot first so a successful execution can always
        // be archived.
        let dest = self.destination(path, Stage::Done);
        self.ensure_free(path, &dest)?;

        let item = self.read_item(path, Stage::Approved)?;
        let command = ActionCommand::from_item(&item.content)?;
        info!(
            item = %item.name,
            command = command.type_name(),
            family = %command.family(),
            "executing approved action"
        );

        let response = self.executors.dispatch(&command).await?;
        debug!(item = %item.name, response = %response, "collaborator response");

        self.transition(path, Stage::Done)?;
        Ok(())
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

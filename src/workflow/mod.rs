// src/workflow/mod.rs

//! Filesystem-backed stage state machine.
//!
//! A vault is a directory with one sub-folder per [`Stage`]. An action item
//! is a markdown file; its stage is the folder it currently lives in, and the
//! only way it changes stage is an atomic rename performed by
//! [`WorkflowStore`].
//!
//! - [`plan`] builds and renders the plan artifact written on ingestion.
//! - [`command`] parses the structured command embedded in approved items.
//! - [`executor`] dispatches commands to external collaborators.
//! - [`store`] owns the folders and the transition protocol.

pub mod command;
pub mod executor;
pub mod plan;
pub mod store;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

pub use command::{ActionCommand, CommandFamily};
pub use executor::{ActionExecutor, ExecutorRegistry, ExternalCommandExecutor};
pub use plan::{MarkdownPlanBuilder, Plan, PlanBuilder};
pub use store::{CycleReport, StageCounts, WorkflowStore};

/// Fixed folders of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Intake: producers drop new items here.
    NeedsAction,
    /// Plans written on ingestion.
    Plans,
    /// Waiting for a human to approve (moved to `Approved` by hand).
    PendingApproval,
    Approved,
    /// Terminal archive.
    Done,
    /// Output folder for scheduled reports.
    Briefings,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::NeedsAction,
        Stage::Plans,
        Stage::PendingApproval,
        Stage::Approved,
        Stage::Done,
        Stage::Briefings,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::NeedsAction => "Needs_Action",
            Stage::Plans => "Plans",
            Stage::PendingApproval => "Pending_Approval",
            Stage::Approved => "Approved",
            Stage::Done => "Done",
            Stage::Briefings => "Briefings",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Resolves stage folders under a vault root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    /// Private bookkeeping (scheduler markers) lives here.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".vaultflow")
    }
}

/// An action item read from a stage folder.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// File name; the item's identity within its stage.
    pub name: String,
    pub path: PathBuf,
    pub stage: Stage,
    pub content: String,
    pub created: DateTime<Local>,
}

impl WorkItem {
    /// File name without its extension (`request.md` -> `request`).
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Whether a directory entry is an action item: a visible `*.md` file.
///
/// Hidden files are skipped so producers can write `.<name>.tmp` and rename
/// into place.
pub(crate) fn is_item_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('.') && path.extension().is_some_and(|ext| ext == "md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_files_are_visible_markdown() {
        assert!(is_item_file(Path::new("/v/Needs_Action/request.md")));
        assert!(!is_item_file(Path::new("/v/Needs_Action/.request.md.tmp")));
        assert!(!is_item_file(Path::new("/v/Needs_Action/.hidden.md")));
        assert!(!is_item_file(Path::new("/v/Needs_Action/photo.png")));
    }

    #[test]
    fn stage_dirs_use_fixed_names() {
        let layout = VaultLayout::new("/vault");
        assert_eq!(
            layout.stage_dir(Stage::PendingApproval),
            PathBuf::from("/vault/Pending_Approval")
        );
        assert_eq!(layout.state_dir(), PathBuf::from("/vault/.vaultflow"));
    }
}

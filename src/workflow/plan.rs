// src/workflow/plan.rs

use chrono::{DateTime, Local};

use crate::errors::Result;
use crate::workflow::WorkItem;

const DEFAULT_STEPS: [&str; 5] = [
    "Analyze the request",
    "Determine appropriate action",
    "Execute action (if approved)",
    "Log results",
    "Mark as complete",
];

const ORIGINAL_CONTENT_HEADING: &str = "\n## Original Content\n";
const STEPS_HEADING: &str = "\n\n## Steps\n";

/// Plan derived from an ingested item.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// File name of the item this plan was made for.
    pub source: String,
    pub source_stem: String,
    pub created: DateTime<Local>,
    pub steps: Vec<String>,
    pub approval_required: bool,
    pub original_content: String,
}

impl Plan {
    /// `PLAN_<source-stem>_<unix-timestamp>.md`
    pub fn file_name(&self) -> String {
        format!("PLAN_{}_{}.md", self.source_stem, self.created.timestamp())
    }

    pub fn render(&self) -> String {
        let steps: String = self.steps.iter().map(|step| format!("- [ ] {step}\n")).collect();
        let approval = if self.approval_required {
            "This action requires human approval. Move the approval request from Pending_Approval to Approved to execute it."
        } else {
            "No approval required."
        };

        format!(
            "---
created: {created}
status: pending
original_file: {source}
approval_required: {approval_required}
---

# Plan for {stem}

## Objective
Process the action requested in {source}

## Original Content
{content}

## Steps
{steps}
## Approval Required
{approval}
",
            created = self.created.format("%Y-%m-%dT%H:%M:%S"),
            source = self.source,
            approval_required = self.approval_required,
            stem = self.source_stem,
            content = self.original_content.trim_end(),
        )
    }

    /// Whether `rendered` is the plan for this exact item: same file name and
    /// same content. A later item reusing a file name gets its own plan.
    pub fn was_made_for(rendered: &str, item: &WorkItem) -> bool {
        Self::source_of(rendered) == Some(item.name.as_str())
            && Self::recorded_content_of(rendered) == Some(item.content.trim_end())
    }

    /// The `## Original Content` section of a rendered plan.
    pub fn recorded_content_of(rendered: &str) -> Option<&str> {
        let start = rendered.find(ORIGINAL_CONTENT_HEADING)? + ORIGINAL_CONTENT_HEADING.len();
        let end = rendered.rfind(STEPS_HEADING)?;
        rendered.get(start..end)
    }

    /// Read `original_file` back out of a rendered plan.
    pub fn source_of(rendered: &str) -> Option<&str> {
        let mut lines = rendered.lines();
        if lines.next()?.trim() != "---" {
            return None;
        }
        lines
            .take_while(|l| l.trim() != "---")
            .find_map(|l| l.strip_prefix("original_file:"))
            .map(str::trim)
    }
}

/// Builds the plan for an item. The content heuristics are pluggable.
pub trait PlanBuilder: Send + Sync {
    fn build(&self, item: &WorkItem, now: DateTime<Local>) -> Result<Plan>;
}

/// Default builder: fixed checklist, approval flagged by keyword.
#[derive(Debug, Clone)]
pub struct MarkdownPlanBuilder {
    approval_keywords: Vec<String>,
}

impl MarkdownPlanBuilder {
    pub fn new(approval_keywords: Vec<String>) -> Self {
        let approval_keywords = approval_keywords
            .into_iter()
            .map(|k| k.to_lowercase())
            .collect();
        Self { approval_keywords }
    }

    pub fn default_keywords() -> Vec<String> {
        ["approval", "approve", "payment", "invoice", "expense", "transfer"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn needs_approval(&self, content: &str) -> bool {
        let lower = content.to_lowercase();
        self.approval_keywords.iter().any(|k| lower.contains(k))
    }
}

impl Default for MarkdownPlanBuilder {
    fn default() -> Self {
        Self::new(Self::default_keywords())
    }
}

impl PlanBuilder for MarkdownPlanBuilder {
    fn build(&self, item: &WorkItem, now: DateTime<Local>) -> Result<Plan> {
        Ok(Plan {
            source: item.name.clone(),
            source_stem: item.stem().to_string(),
            created: now,
            steps: DEFAULT_STEPS.iter().map(|s| s.to_string()).collect(),
            approval_required: self.needs_approval(&item.content),
            original_content: item.content.clone(),
        })
    }
}

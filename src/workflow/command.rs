// src/workflow/command.rs

//! Commands carried by approved items.
//!
//! An approved item is markdown with a YAML front matter block whose `type`
//! field names the command:
//!
//! ```text
//! ---
//! type: create_invoice
//! partner_id: 42
//! lines:
//!   - name: Consulting
//!     quantity: 3
//!     price_unit: 150
//! ---
//! Invoice for October.
//! ```
//!
//! Known tags map onto [`ActionCommand`]; anything else is reported as
//! [`VaultflowError::UnknownCommand`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, VaultflowError};

/// Which external collaborator handles a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandFamily {
    Accounting,
    Social,
}

impl FromStr for CommandFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accounting" => Ok(CommandFamily::Accounting),
            "social" => Ok(CommandFamily::Social),
            other => Err(format!(
                "unknown executor family: {other} (expected \"accounting\" or \"social\")"
            )),
        }
    }
}

impl fmt::Display for CommandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFamily::Accounting => f.write_str("accounting"),
            CommandFamily::Social => f.write_str("social"),
        }
    }
}

fn default_visibility() -> String {
    "PUBLIC".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionCommand {
    CreateInvoice {
        partner_id: i64,
        #[serde(default)]
        lines: Vec<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
    },
    SearchInvoices {
        #[serde(default)]
        domain: Vec<Value>,
    },
    GetInvoice {
        invoice_id: i64,
    },
    CreatePartner {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
    },
    SearchPartners {
        #[serde(default)]
        domain: Vec<Value>,
    },
    GetPartner {
        partner_id: i64,
    },
    CreateExpense {
        partner_id: i64,
        product_id: i64,
        amount: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
    },
    Post {
        text: String,
        #[serde(default = "default_visibility")]
        visibility: String,
    },
    SchedulePost {
        text: String,
        scheduled_time: DateTime<FixedOffset>,
        #[serde(default = "default_visibility")]
        visibility: String,
    },
    GetProfile,
}

impl ActionCommand {
    pub const KNOWN_TYPES: [&'static str; 10] = [
        "create_invoice",
        "search_invoices",
        "get_invoice",
        "create_partner",
        "search_partners",
        "get_partner",
        "create_expense",
        "post",
        "schedule_post",
        "get_profile",
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            ActionCommand::CreateInvoice { .. } => "create_invoice",
            ActionCommand::SearchInvoices { .. } => "search_invoices",
            ActionCommand::GetInvoice { .. } => "get_invoice",
            ActionCommand::CreatePartner { .. } => "create_partner",
            ActionCommand::SearchPartners { .. } => "search_partners",
            ActionCommand::GetPartner { .. } => "get_partner",
            ActionCommand::CreateExpense { .. } => "create_expense",
            ActionCommand::Post { .. } => "post",
            ActionCommand::SchedulePost { .. } => "schedule_post",
            ActionCommand::GetProfile => "get_profile",
        }
    }

    pub fn family(&self) -> CommandFamily {
        match self {
            ActionCommand::CreateInvoice { .. }
            | ActionCommand::SearchInvoices { .. }
            | ActionCommand::GetInvoice { .. }
            | ActionCommand::CreatePartner { .. }
            | ActionCommand::SearchPartners { .. }
            | ActionCommand::GetPartner { .. }
            | ActionCommand::CreateExpense { .. } => CommandFamily::Accounting,
            ActionCommand::Post { .. }
            | ActionCommand::SchedulePost { .. }
            | ActionCommand::GetProfile => CommandFamily::Social,
        }
    }

    /// Parse a structured message (`{"type": ..., ...}`).
    pub fn from_message(message: Value) -> Result<Self> {
        let tag = match message.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => return Err(VaultflowError::UnknownCommand(other.to_string())),
            None => return Err(VaultflowError::UnknownCommand("(missing type)".to_string())),
        };

        if !Self::KNOWN_TYPES.contains(&tag.as_str()) {
            return Err(VaultflowError::UnknownCommand(tag));
        }

        Ok(serde_json::from_value(message)?)
    }

    /// Parse the command embedded in an item's front matter.
    pub fn from_item(content: &str) -> Result<Self> {
        let block = front_matter(content)
            .ok_or_else(|| VaultflowError::UnknownCommand("(no front matter)".to_string()))?;
        let yaml: serde_yaml::Value = serde_yaml::from_str(block)?;
        let message = serde_json::to_value(yaml)?;
        Self::from_message(message)
    }
}

/// The text between a leading `---` line and the next `---` line.
pub fn front_matter(content: &str) -> Option<&str> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}

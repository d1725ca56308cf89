// src/engine/mod.rs

//! Run loops.
//!
//! - [`orchestrator`] drives ingestion, approvals and the scheduler on one
//!   timer (`vaultflow run`).
//! - [`ticker`] paces any polling loop and carries the stop signal.
//! - [`wake`] optionally shortens the orchestrator's sleep when the vault
//!   changes.
//!
//! The supervisor loop lives with the supervisor
//! ([`crate::supervisor::Supervisor::run`]) and uses the same [`Ticker`].

pub mod orchestrator;
pub mod ticker;
pub mod wake;

pub use orchestrator::{CycleSummary, Orchestrator};
pub use ticker::Ticker;
pub use wake::{spawn_vault_watcher, VaultWatcherHandle};

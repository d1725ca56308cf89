#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use vaultflow::errors::ErrorKind;
use vaultflow::fs::RealFileSystem;
use vaultflow::retry::RetryPolicy;
use vaultflow::workflow::{ExecutorRegistry, MarkdownPlanBuilder, WorkflowStore};
use vaultflow_test_utils::builders::TempVault;

pub use vaultflow_test_utils::init_tracing;

/// Retries transient failures without sleeping.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff_factor: 2.0,
        retry_on: HashSet::from([ErrorKind::Transient]),
    }
}

/// Store on the real filesystem rooted at `vault`.
pub fn real_store(vault: &TempVault, executors: ExecutorRegistry) -> WorkflowStore {
    WorkflowStore::new(
        Arc::new(RealFileSystem),
        vault.layout().clone(),
        Box::new(MarkdownPlanBuilder::default()),
        executors,
    )
}

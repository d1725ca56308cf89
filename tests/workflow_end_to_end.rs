// tests/workflow_end_to_end.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use vaultflow::build_orchestrator;
use vaultflow::engine::Ticker;
use vaultflow::fs::RealFileSystem;
use vaultflow::workflow::{CommandFamily, ExecutorRegistry, Plan, Stage};
use vaultflow_test_utils::builders::{ConfigFileBuilder, TempVault};
use vaultflow_test_utils::fakes::{FakeExecutor, FakeOutcome};
use vaultflow_test_utils::with_timeout;

use common::{fast_retry, init_tracing, real_store};

#[test]
fn request_is_planned_and_archived_in_one_cycle() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::NeedsAction, "request.md", "Need approval for expense");
    let store = real_store(&vault, ExecutorRegistry::new(fast_retry(1)));

    let report = store.ingest(&CancellationToken::new()).unwrap();

    assert_eq!(report.completed, vec!["request.md".to_string()]);
    assert!(vault.files_in(Stage::NeedsAction).is_empty());
    assert_eq!(vault.files_in(Stage::Done), vec!["request.md".to_string()]);
    assert_eq!(
        vault.read(Stage::Done, "request.md"),
        "Need approval for expense"
    );

    let plans = vault.files_in(Stage::Plans);
    assert_eq!(plans.len(), 1);
    assert!(plans[0].starts_with("PLAN_request_") && plans[0].ends_with(".md"));
    let plan = vault.read(Stage::Plans, &plans[0]);
    assert_eq!(Plan::source_of(&plan), Some("request.md"));
    assert!(plan.contains("approval_required: true"));
}

#[test]
fn fresh_orchestrator_after_archive_does_not_reprocess() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::NeedsAction, "request.md", "hello");
    real_store(&vault, ExecutorRegistry::new(fast_retry(1)))
        .ingest(&CancellationToken::new())
        .unwrap();

    // A brand-new store sees nothing left to do.
    let restarted = real_store(&vault, ExecutorRegistry::new(fast_retry(1)));
    let report = restarted.ingest(&CancellationToken::new()).unwrap();

    assert!(report.completed.is_empty());
    assert_eq!(vault.files_in(Stage::Plans).len(), 1);
    assert_eq!(vault.files_in(Stage::Done), vec!["request.md".to_string()]);
}

#[test]
fn conflict_in_done_leaves_item_and_archive_untouched() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::Done, "request.md", "archived earlier");
    vault.add_item(Stage::NeedsAction, "request.md", "new request");
    let store = real_store(&vault, ExecutorRegistry::new(fast_retry(1)));

    for _ in 0..3 {
        let report = store.ingest(&CancellationToken::new()).unwrap();
        assert_eq!(report.conflicts, vec!["request.md".to_string()]);
    }

    assert_eq!(vault.read(Stage::NeedsAction, "request.md"), "new request");
    assert_eq!(vault.read(Stage::Done, "request.md"), "archived earlier");
    assert!(vault.files_in(Stage::Plans).is_empty());
}

#[test]
fn plan_left_by_an_interrupted_run_is_reused() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::NeedsAction, "request.md", "hello");
    vault.add_item(
        Stage::Plans,
        "PLAN_request_1760000000.md",
        "---\nstatus: pending\noriginal_file: request.md\n---\n\n# Plan for request\n\n## Original Content\nhello\n\n## Steps\n- [ ] Analyze the request\n",
    );
    let store = real_store(&vault, ExecutorRegistry::new(fast_retry(1)));

    let report = store.ingest(&CancellationToken::new()).unwrap();

    assert_eq!(report.completed, vec!["request.md".to_string()]);
    assert_eq!(
        vault.files_in(Stage::Plans),
        vec!["PLAN_request_1760000000.md".to_string()]
    );
    assert_eq!(vault.files_in(Stage::Done), vec!["request.md".to_string()]);
}

#[test]
fn recycled_file_name_is_planned_again() {
    init_tracing();
    let vault = TempVault::new();
    let store = real_store(&vault, ExecutorRegistry::new(fast_retry(1)));
    vault.add_item(Stage::NeedsAction, "request.md", "Old request");
    store.ingest(&CancellationToken::new()).unwrap();

    // The archived copy is cleared and a different request reuses the name.
    std::fs::remove_file(vault.layout().stage_dir(Stage::Done).join("request.md")).unwrap();
    vault.add_item(Stage::NeedsAction, "request.md", "New request");

    let report = store.ingest(&CancellationToken::new()).unwrap();

    assert_eq!(report.completed, vec!["request.md".to_string()]);
    let plans = vault.files_in(Stage::Plans);
    assert_eq!(plans.len(), 2);
    assert!(
        plans
            .iter()
            .any(|p| vault.read(Stage::Plans, p).contains("## Original Content\nNew request\n")),
        "{plans:?}"
    );
}

const INVOICE: &str = "---\ntype: create_invoice\npartner_id: 7\nlines:\n  - name: Consulting\n    quantity: 2\n    price_unit: 100\n---\nOctober consulting\n";

#[tokio::test]
async fn approved_command_is_executed_once_and_archived() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::Approved, "invoice.md", INVOICE);
    let accounting = FakeExecutor::new().then(FakeOutcome::Success(json!({"invoice_id": 99})));
    let store = real_store(
        &vault,
        ExecutorRegistry::new(fast_retry(3)).with_executor(CommandFamily::Accounting, accounting.clone()),
    );

    let first = store.check_approvals(&CancellationToken::new()).await.unwrap();
    let second = store.check_approvals(&CancellationToken::new()).await.unwrap();

    assert_eq!(first.completed, vec!["invoice.md".to_string()]);
    assert!(second.completed.is_empty());
    assert_eq!(accounting.calls(), vec!["create_invoice".to_string()]);
    assert_eq!(vault.files_in(Stage::Done), vec!["invoice.md".to_string()]);
}

#[tokio::test]
async fn transient_failures_are_retried_within_the_cycle() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::Approved, "invoice.md", INVOICE);
    let accounting = FakeExecutor::new()
        .then(FakeOutcome::Transient("connection reset".into()))
        .then(FakeOutcome::Transient("connection reset".into()));
    let store = real_store(
        &vault,
        ExecutorRegistry::new(fast_retry(3)).with_executor(CommandFamily::Accounting, accounting.clone()),
    );

    let report = store.check_approvals(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.completed, vec!["invoice.md".to_string()]);
    assert_eq!(accounting.calls().len(), 3);
}

#[tokio::test]
async fn rejected_command_stays_approved_for_next_cycle() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::Approved, "invoice.md", INVOICE);
    let accounting = FakeExecutor::new().then(FakeOutcome::Rejected("Odoo not configured".into()));
    let store = real_store(
        &vault,
        ExecutorRegistry::new(fast_retry(3)).with_executor(CommandFamily::Accounting, accounting.clone()),
    );

    let failed = store.check_approvals(&CancellationToken::new()).await.unwrap();
    assert_eq!(failed.failed, vec!["invoice.md".to_string()]);
    assert_eq!(accounting.calls().len(), 1);
    assert_eq!(vault.files_in(Stage::Approved), vec!["invoice.md".to_string()]);

    // Script exhausted: the next cycle succeeds.
    let retried = store.check_approvals(&CancellationToken::new()).await.unwrap();
    assert_eq!(retried.completed, vec!["invoice.md".to_string()]);
}

#[tokio::test]
async fn taken_archive_slot_blocks_execution() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::Approved, "invoice.md", INVOICE);
    vault.add_item(Stage::Done, "invoice.md", "older invoice");
    let accounting = FakeExecutor::new();
    let store = real_store(
        &vault,
        ExecutorRegistry::new(fast_retry(1)).with_executor(CommandFamily::Accounting, accounting.clone()),
    );

    let report = store.check_approvals(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.conflicts, vec!["invoice.md".to_string()]);
    assert!(accounting.calls().is_empty());
}

#[tokio::test]
async fn one_bad_item_does_not_block_the_rest() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::Approved, "a_unknown.md", "---\ntype: teleport\n---\n");
    vault.add_item(Stage::Approved, "b_post.md", "---\ntype: post\ntext: Launch day\n---\n");
    let social = FakeExecutor::new();
    let store = real_store(
        &vault,
        ExecutorRegistry::new(fast_retry(1)).with_executor(CommandFamily::Social, social.clone()),
    );

    let report = store.check_approvals(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.failed, vec!["a_unknown.md".to_string()]);
    assert_eq!(report.completed, vec!["b_post.md".to_string()]);
    assert_eq!(social.calls(), vec!["post".to_string()]);
}

#[tokio::test]
async fn single_orchestrator_run_drains_intake() {
    init_tracing();
    let vault = TempVault::new();
    let cfg = ConfigFileBuilder::new()
        .vault(vault.root())
        .immediate_retries(1)
        .build();
    vault.add_item(Stage::NeedsAction, "email_1.md", "From: client\nPlease send the invoice");
    let mut orchestrator = build_orchestrator(&cfg, Arc::new(RealFileSystem));

    let ticker = Ticker::new(Duration::from_secs(3600), CancellationToken::new());
    with_timeout(orchestrator.run(&ticker, true)).await.unwrap();

    assert!(vault.files_in(Stage::NeedsAction).is_empty());
    assert_eq!(vault.files_in(Stage::Done), vec!["email_1.md".to_string()]);
    let plans = vault.files_in(Stage::Plans);
    assert_eq!(plans.len(), 1);
    assert!(vault.read(Stage::Plans, &plans[0]).contains("approval_required: true"));
}

// tests/scheduler_restart.rs

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use vaultflow::fs::{FileSystem, RealFileSystem};
use vaultflow::schedule::{default_jobs, FileMarkerStore, MarkerStore, Scheduler};
use vaultflow::workflow::{ExecutorRegistry, Stage};
use vaultflow_test_utils::builders::TempVault;

use common::{fast_retry, init_tracing, real_store};

fn scheduler_for(vault: &TempVault) -> Scheduler {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let markers = FileMarkerStore::new(fs.clone(), vault.layout().state_dir());
    Scheduler::new(fs, default_jobs(), Box::new(markers), fast_retry(1))
}

#[tokio::test]
async fn report_fires_once_per_day_across_restarts() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::NeedsAction, "a.md", "x");
    vault.add_item(Stage::PendingApproval, "b.md", "y");
    let store = real_store(&vault, ExecutorRegistry::new(fast_retry(1)));
    let at = NaiveDate::from_ymd_opt(2026, 10, 14)
        .unwrap()
        .and_hms_opt(8, 1, 0)
        .unwrap();

    let first = scheduler_for(&vault).tick(at, &store).await;
    assert_eq!(first.fired, vec!["daily_status".to_string()]);
    assert_eq!(
        vault.files_in(Stage::Briefings),
        vec!["2026-10-14_Daily_Status.md".to_string()]
    );
    let body = vault.read(Stage::Briefings, "2026-10-14_Daily_Status.md");
    assert!(body.contains("- **Pending Actions**: 1"), "{body}");
    assert!(body.contains("- **Pending Approvals**: 1"), "{body}");

    // Simulated restart: a new scheduler reads the persisted marker.
    let later = at + chrono::Duration::minutes(2);
    let second = scheduler_for(&vault).tick(later, &store).await;
    assert!(second.fired.is_empty());

    let markers = FileMarkerStore::new(Arc::new(RealFileSystem), vault.layout().state_dir());
    assert_eq!(
        markers.load("daily_status").unwrap(),
        NaiveDate::from_ymd_opt(2026, 10, 14)
    );
}

#[tokio::test]
async fn sunday_morning_produces_the_weekly_briefing() {
    init_tracing();
    let vault = TempVault::new();
    vault.add_item(Stage::Done, "done.md", "x");
    let store = real_store(&vault, ExecutorRegistry::new(fast_retry(1)));
    let sunday = NaiveDate::from_ymd_opt(2026, 10, 11)
        .unwrap()
        .and_hms_opt(7, 0, 0)
        .unwrap();

    let report = scheduler_for(&vault).tick(sunday, &store).await;

    assert_eq!(report.fired, vec!["weekly_briefing".to_string()]);
    let body = vault.read(Stage::Briefings, "2026-10-11_Weekly_Briefing.md");
    assert!(body.contains("- 1 tasks completed"), "{body}");
    assert!(body.contains("No finance source configured."), "{body}");
}

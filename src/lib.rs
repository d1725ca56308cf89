// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod retry;
pub mod schedule;
pub mod supervisor;
pub mod types;
pub mod workflow;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Notify;
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_for_cli;
use crate::config::model::ConfigFile;
use crate::engine::{spawn_vault_watcher, Orchestrator, Ticker};
use crate::fs::{FileSystem, RealFileSystem};
use crate::schedule::{FileMarkerStore, Scheduler};
use crate::supervisor::{
    process_table, AlertSink, FileAlertSink, LogAlertSink, Supervisor, TokioLauncher,
};
use crate::workflow::executor::ExternalCommandExecutor;
use crate::workflow::{ExecutorRegistry, MarkdownPlanBuilder, Stage, VaultLayout, WorkflowStore};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the orchestrator or the supervisor, depending on the subcommand
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_for_cli(args.config.as_deref())?;

    match args.command {
        Command::Check => {
            print_check(&cfg);
            Ok(())
        }
        Command::Run { once } => run_orchestrator(&cfg, once).await,
        Command::Watchdog { once } => {
            run_watchdog(&cfg, once).await;
            Ok(())
        }
    }
}

/// Build the workflow store for a vault on the real filesystem.
pub fn build_store(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> WorkflowStore {
    let mut executors = ExecutorRegistry::new(cfg.retry.clone());
    for spec in &cfg.executors {
        executors = executors.with_executor(spec.family, ExternalCommandExecutor::new(spec.clone()));
    }

    WorkflowStore::new(
        fs,
        VaultLayout::new(&cfg.vault),
        Box::new(MarkdownPlanBuilder::new(cfg.approval_keywords.clone())),
        executors,
    )
}

pub fn build_orchestrator(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Orchestrator {
    let store = build_store(cfg, fs.clone());
    let markers = FileMarkerStore::new(fs.clone(), store.layout().state_dir());
    let scheduler = Scheduler::new(fs, cfg.jobs.clone(), Box::new(markers), cfg.retry.clone());
    Orchestrator::new(store, scheduler)
}

pub fn build_supervisor(cfg: &ConfigFile) -> Supervisor {
    let mut alerts: Vec<Box<dyn AlertSink>> = vec![Box::new(LogAlertSink)];
    if let Some(path) = &cfg.supervisor.alert_file {
        alerts.push(Box::new(FileAlertSink::new(path)));
    }

    Supervisor::new(
        cfg.processes.clone(),
        process_table::system_table(),
        Box::new(TokioLauncher),
        alerts,
        cfg.supervisor.match_mode,
    )
    .with_alert_once_when_down(cfg.supervisor.alert_once_when_down)
}

async fn run_orchestrator(cfg: &ConfigFile, once: bool) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut orchestrator = build_orchestrator(cfg, fs);

    let cancel = shutdown_token();
    let mut ticker = Ticker::new(cfg.poll_interval, cancel);

    // Optional early wake-up (disabled in --once mode).
    let _watcher_handle = if cfg.watch_vault && !once {
        if let Err(e) = orchestrator.store().ensure_stage_folders() {
            warn!(error = %e, "cannot create stage folders before watching");
        }
        let wake = Arc::new(Notify::new());
        let layout = orchestrator.store().layout();
        let dirs = [
            layout.stage_dir(Stage::NeedsAction),
            layout.stage_dir(Stage::Approved),
        ];
        match spawn_vault_watcher(&dirs, wake.clone()) {
            Ok(handle) => {
                ticker = ticker.with_wake(wake);
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "vault watcher unavailable; relying on polling");
                None
            }
        }
    } else {
        None
    };

    orchestrator.run(&ticker, once).await?;
    Ok(())
}

async fn run_watchdog(cfg: &ConfigFile, once: bool) {
    if cfg.processes.is_empty() {
        warn!("no [process.<name>] entries configured; nothing to supervise");
    }
    let mut supervisor = build_supervisor(cfg);
    let ticker = Ticker::new(cfg.supervisor.poll_interval, shutdown_token());
    supervisor.run(&ticker, once).await;
}

/// Ctrl-C, or SIGTERM on Unix, cancels the returned token.
///
/// The SIGTERM listener is installed before this returns.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    #[cfg(unix)]
    let sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => Some(sig),
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM; only Ctrl+C stops cleanly");
            None
        }
    };

    tokio::spawn(async move {
        #[cfg(unix)]
        let received = wait_for_stop(sigterm).await;
        #[cfg(not(unix))]
        let received = wait_for_ctrl_c().await;

        if received {
            info!("stop requested; finishing current item");
            token.cancel();
        }
    });
    cancel
}

#[cfg(unix)]
async fn wait_for_stop(sigterm: Option<Signal>) -> bool {
    let Some(mut sigterm) = sigterm else {
        return wait_for_ctrl_c().await;
    };
    tokio::select! {
        received = wait_for_ctrl_c() => received,
        _ = sigterm.recv() => {
            info!("received SIGTERM");
            true
        }
    }
}

async fn wait_for_ctrl_c() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received SIGINT");
            true
        }
        Err(e) => {
            eprintln!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<bool>().await
        }
    }
}

/// Print the validated configuration.
fn print_check(cfg: &ConfigFile) {
    println!("vaultflow check");
    println!("  vault = {}", cfg.vault.display());
    println!("  poll_interval = {:?}", cfg.poll_interval);
    println!("  watch_vault = {}", cfg.watch_vault);
    println!(
        "  retry = {} attempts, base {:?}, max {:?}, x{}",
        cfg.retry.max_attempts, cfg.retry.base_delay, cfg.retry.max_delay, cfg.retry.backoff_factor
    );
    println!("  approval_keywords = {:?}", cfg.approval_keywords);
    println!();

    println!("executors ({}):", cfg.executors.len());
    for exec in &cfg.executors {
        println!("  - {}", exec.family);
        println!("      cmd: {:?}", exec.cmd);
        println!("      timeout: {:?}", exec.timeout);
        if let Some(dir) = &exec.working_dir {
            println!("      working_dir: {}", dir.display());
        }
    }
    println!();

    println!("jobs ({}):", cfg.jobs.len());
    for job in &cfg.jobs {
        println!("  - {} ({:?}) at {}", job.id, job.report, job.trigger);
    }
    println!();

    println!(
        "supervisor: every {:?}, match_mode = {:?}, alert_once_when_down = {}",
        cfg.supervisor.poll_interval, cfg.supervisor.match_mode, cfg.supervisor.alert_once_when_down
    );
    if let Some(path) = &cfg.supervisor.alert_file {
        println!("  alert_file: {}", path.display());
    }
    println!("processes ({}):", cfg.processes.len());
    for p in &cfg.processes {
        println!("  - {}", p.name);
        println!("      cmd: {:?}", p.cmd);
        if p.restart_cmd != p.cmd {
            println!("      restart_cmd: {:?}", p.restart_cmd);
        }
        println!("      working_dir: {}", p.working_dir.display());
        println!("      auto_restart: {}", p.auto_restart);
    }

    debug!("check complete (nothing executed)");
}

// src/engine/wake.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::Notify;
use tracing::info;

/// Keeps the vault watcher alive. Dropping it stops the early wake-ups.
pub struct VaultWatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for VaultWatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultWatcherHandle").finish()
    }
}

/// Watch `dirs` (non-recursively) and notify `wake` when something is
/// created, modified or moved there.
///
/// Only shortens the orchestrator's sleep: the poll interval still applies
/// when events are missed.
pub fn spawn_vault_watcher(dirs: &[PathBuf], wake: Arc<Notify>) -> Result<VaultWatcherHandle> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event.kind) => wake.notify_one(),
            Ok(_) => {}
            Err(err) => {
                eprintln!("vaultflow: vault watch error: {err}");
            }
        },
        Config::default(),
    )?;

    for dir in dirs {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("watching {:?} for new items", dir);
    }

    Ok(VaultWatcherHandle { _inner: watcher })
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

#[cfg(test)]
mod tests {
    use notify::event::{AccessKind, CreateKind, ModifyKind, RenameMode};

    use super::*;

    #[test]
    fn only_content_changes_wake() {
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(!is_relevant(&EventKind::Access(AccessKind::Read)));
    }
}

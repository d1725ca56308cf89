// src/schedule/markers.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::fs::FileSystem;

/// File name of the marker map inside the vault's state directory.
///
/// The effective path on disk is `<vault>/.vaultflow/schedule.json`.
pub const MARKER_FILE_NAME: &str = "schedule.json";

/// Persisted "last fired period" per job.
pub trait MarkerStore: Send + Sync {
    fn load(&self, job: &str) -> Result<Option<NaiveDate>>;
    fn save(&mut self, job: &str, period: NaiveDate) -> Result<()>;
    /// Remove markers for jobs that are not in `active_jobs`.
    fn prune(&mut self, active_jobs: &[&str]) -> Result<()>;
}

/// Stores markers as a JSON object (`{"weekly_briefing": "2026-10-11"}`).
///
/// Every `save` rewrites the whole file with an atomic write, so a crash
/// leaves either the old map or the new one.
#[derive(Debug)]
pub struct FileMarkerStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileMarkerStore {
    pub fn new(fs: Arc<dyn FileSystem>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: state_dir.into().join(MARKER_FILE_NAME),
        }
    }

    fn load_all(&self) -> Result<BTreeMap<String, NaiveDate>> {
        if !self.fs.exists(&self.path) {
            return Ok(BTreeMap::new());
        }
        let text = self.fs.read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text)
            .with_context(|| format!("parsing schedule markers at {:?}", self.path))
    }

    fn save_all(&self, map: &BTreeMap<String, NaiveDate>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        self.fs.write_atomic(&self.path, json.as_bytes())
    }
}

impl MarkerStore for FileMarkerStore {
    fn load(&self, job: &str) -> Result<Option<NaiveDate>> {
        Ok(self.load_all()?.get(job).copied())
    }

    fn save(&mut self, job: &str, period: NaiveDate) -> Result<()> {
        let mut map = self.load_all()?;
        map.insert(job.to_string(), period);
        self.save_all(&map)?;
        info!(job = %job, period = %period, "stored schedule marker (file)");
        Ok(())
    }

    fn prune(&mut self, active_jobs: &[&str]) -> Result<()> {
        let mut map = self.load_all()?;
        let initial_len = map.len();
        map.retain(|k, _| active_jobs.contains(&k.as_str()));

        if map.len() < initial_len {
            self.save_all(&map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale schedule markers (file)"
            );
        }
        Ok(())
    }
}

/// Keeps markers in memory only; a restart forgets them.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    map: BTreeMap<String, NaiveDate>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn load(&self, job: &str) -> Result<Option<NaiveDate>> {
        Ok(self.map.get(job).copied())
    }

    fn save(&mut self, job: &str, period: NaiveDate) -> Result<()> {
        self.map.insert(job.to_string(), period);
        info!(job = %job, period = %period, "stored schedule marker (memory)");
        Ok(())
    }

    fn prune(&mut self, active_jobs: &[&str]) -> Result<()> {
        self.map.retain(|k, _| active_jobs.contains(&k.as_str()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn file_store_survives_a_new_instance() {
        let fs = MockFileSystem::new();
        let mut store = FileMarkerStore::new(Arc::new(fs.clone()), "/vault/.vaultflow");
        store.save("weekly_briefing", date(2026, 10, 11)).unwrap();

        let reopened = FileMarkerStore::new(Arc::new(fs.clone()), "/vault/.vaultflow");
        assert_eq!(
            reopened.load("weekly_briefing").unwrap(),
            Some(date(2026, 10, 11))
        );
        assert_eq!(reopened.load("daily_status").unwrap(), None);

        let raw = fs
            .read_to_string(Path::new("/vault/.vaultflow/schedule.json"))
            .unwrap();
        assert!(raw.contains("\"weekly_briefing\": \"2026-10-11\""));
    }

    #[test]
    fn prune_drops_unknown_jobs() {
        let fs = MockFileSystem::new();
        let mut store = FileMarkerStore::new(Arc::new(fs), "/vault/.vaultflow");
        store.save("old_job", date(2026, 1, 1)).unwrap();
        store.save("daily_status", date(2026, 1, 2)).unwrap();

        store.prune(&["daily_status"]).unwrap();

        assert_eq!(store.load("old_job").unwrap(), None);
        assert_eq!(store.load("daily_status").unwrap(), Some(date(2026, 1, 2)));
    }

    #[test]
    fn corrupt_marker_file_is_an_error() {
        let fs = MockFileSystem::new();
        fs.add_file("/vault/.vaultflow/schedule.json", "{not json");
        let store = FileMarkerStore::new(Arc::new(fs), "/vault/.vaultflow");
        assert!(store.load("daily_status").is_err());
    }
}

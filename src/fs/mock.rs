// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::errors::VaultflowError;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir,
}

/// In-memory filesystem for unit tests.
///
/// Directories are explicit entries; files added with [`MockFileSystem::add_file`]
/// get their parent chain created implicitly. `rename` can be told to fail for
/// specific source paths to exercise error containment.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
    failing_renames: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut entries = self.entries.lock().unwrap();
        if let Some(parent) = path.parent() {
            insert_dirs(&mut entries, parent);
        }
        entries.insert(
            path,
            MockEntry::File {
                content: content.into(),
                modified: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.entries.lock().unwrap();
        insert_dirs(&mut entries, path.as_ref());
    }

    /// Make every subsequent `rename` whose source is `path` fail.
    pub fn fail_rename_from(&self, path: impl AsRef<Path>) {
        self.failing_renames
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf());
    }

    /// All file paths currently stored, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File { .. }))
            .map(|(p, _)| p.clone())
            .collect()
    }
}

fn insert_dirs(entries: &mut BTreeMap<PathBuf, MockEntry>, dir: &Path) {
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        entries
            .entry(ancestor.to_path_buf())
            .or_insert(MockEntry::Dir);
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(MockEntry::File { content, .. }) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries.lock().unwrap().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap();
        matches!(entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap();
        matches!(entries.get(path), Some(MockEntry::Dir))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(MockEntry::File { .. }) = entries.get(path) {
            return Err(anyhow!("File exists: {:?}", path));
        }
        insert_dirs(&mut entries, path);
        Ok(())
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir) => Ok(UNIX_EPOCH),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(MockEntry::Dir) => Ok(entries
                .keys()
                .filter(|p| p.parent() == Some(path))
                .cloned()
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> crate::errors::Result<()> {
        if self.failing_renames.lock().unwrap().contains(from) {
            return Err(VaultflowError::Other(anyhow!(
                "injected rename failure for {:?}",
                from
            )));
        }

        let mut entries = self.entries.lock().unwrap();
        match entries.get(to.parent().unwrap_or(Path::new(""))) {
            Some(MockEntry::Dir) => {}
            _ => {
                return Err(VaultflowError::Other(anyhow!(
                    "destination directory missing for {:?}",
                    to
                )));
            }
        }
        match entries.remove(from) {
            Some(entry @ MockEntry::File { .. }) => {
                entries.insert(to.to_path_buf(), entry);
                Ok(())
            }
            Some(other) => {
                entries.insert(from.to_path_buf(), other);
                Err(VaultflowError::Other(anyhow!("cannot move directory {:?}", from)))
            }
            None => Err(VaultflowError::Other(anyhow!("File not found: {:?}", from))),
        }
    }
}

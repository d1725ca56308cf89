#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vaultflow::config::model::{ExecutorConfig, JobConfig, ProcessConfig};
use vaultflow::config::{ConfigFile, RawConfigFile};
use vaultflow::workflow::{Stage, VaultLayout};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn vault(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config.vault = path.into();
        self
    }

    /// Retry policy without sleeps, so tests stay fast.
    pub fn immediate_retries(mut self, max_attempts: u32) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self.config.retry.base_delay = "0ms".to_string();
        self.config.retry.max_delay = "0ms".to_string();
        self
    }

    pub fn with_executor(mut self, family: &str, cmd: &[&str]) -> Self {
        self.config.executor.insert(
            family.to_string(),
            ExecutorConfig {
                cmd: cmd.iter().map(|s| s.to_string()).collect(),
                working_dir: None,
                timeout: "5s".to_string(),
                env: BTreeMap::new(),
            },
        );
        self
    }

    pub fn with_process(mut self, name: &str, cmd: &[&str], auto_restart: bool) -> Self {
        self.config.process.insert(
            name.to_string(),
            ProcessConfig {
                cmd: cmd.iter().map(|s| s.to_string()).collect(),
                restart_cmd: None,
                working_dir: PathBuf::from("."),
                auto_restart,
            },
        );
        self
    }

    pub fn alert_once_when_down(mut self) -> Self {
        self.config.supervisor.alert_once_when_down = true;
        self
    }

    pub fn disable_job(mut self, id: &str) -> Self {
        self.config.job.insert(
            id.to_string(),
            JobConfig {
                report: None,
                weekday: None,
                hour: None,
                minute_window: None,
                enabled: false,
            },
        );
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A vault in a temporary directory with every stage folder created.
pub struct TempVault {
    dir: TempDir,
    layout: VaultLayout,
}

impl TempVault {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let layout = VaultLayout::new(dir.path().join("vault"));
        for stage in Stage::ALL {
            fs::create_dir_all(layout.stage_dir(stage)).expect("creating stage folder");
        }
        Self { dir, layout }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// The temp dir itself (parent of the vault), e.g. for config files.
    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_item(&self, stage: Stage, name: &str, content: &str) -> PathBuf {
        let path = self.layout.stage_dir(stage).join(name);
        fs::write(&path, content).expect("writing item");
        path
    }

    /// Visible file names in a stage folder, sorted.
    pub fn files_in(&self, stage: Stage) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.layout.stage_dir(stage))
            .expect("reading stage folder")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    pub fn read(&self, stage: Stage, name: &str) -> String {
        fs::read_to_string(self.layout.stage_dir(stage).join(name)).expect("reading item")
    }
}

impl Default for TempVault {
    fn default() -> Self {
        Self::new()
    }
}

// src/supervisor/process_table.rs

//! Snapshots of the OS process table.
//!
//! On Linux the table is read straight from `/proc/<pid>/cmdline`, which
//! gives the exact argv. Elsewhere `ps -eo pid=,args=` is used; it only
//! yields a joined command line, so `exact` matching degrades to `contains`
//! there.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::types::MatchMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Split argv, when the platform exposes it.
    pub argv: Option<Vec<String>>,
    /// Command line joined with spaces.
    pub cmdline: String,
}

impl ProcessInfo {
    pub fn from_argv(pid: u32, argv: Vec<String>) -> Self {
        let cmdline = argv.join(" ");
        Self {
            pid,
            argv: Some(argv),
            cmdline,
        }
    }

    pub fn from_cmdline(pid: u32, cmdline: impl Into<String>) -> Self {
        Self {
            pid,
            argv: None,
            cmdline: cmdline.into(),
        }
    }
}

pub trait ProcessTable: Send + Sync {
    fn snapshot(&self) -> Result<Vec<ProcessInfo>>;
}

/// Does `info` look like an instance of the process identified by `cmd`?
///
/// An empty identity never matches.
pub fn matches(cmd: &[String], info: &ProcessInfo, mode: MatchMode) -> bool {
    if cmd.is_empty() {
        return false;
    }
    match (mode, &info.argv) {
        (MatchMode::Exact, Some(argv)) => argv.as_slice() == cmd,
        _ => cmd.iter().all(|token| info.cmdline.contains(token.as_str())),
    }
}

/// Reads `<root>/<pid>/cmdline` for every numeric entry of `root`.
#[derive(Debug, Clone)]
pub struct ProcfsTable {
    root: PathBuf,
}

impl ProcfsTable {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcfsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for ProcfsTable {
    fn snapshot(&self) -> Result<Vec<ProcessInfo>> {
        let mut out = Vec::new();
        let entries =
            fs::read_dir(&self.root).with_context(|| format!("reading {:?}", self.root))?;

        for entry in entries {
            let entry = entry?;
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };

            // Processes exit between readdir and read; skip them.
            let Ok(raw) = fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let argv = parse_cmdline(&raw);
            if argv.is_empty() {
                // Kernel threads and zombies have no command line.
                continue;
            }
            out.push(ProcessInfo::from_argv(pid, argv));
        }

        debug!(count = out.len(), "process table snapshot (procfs)");
        Ok(out)
    }
}

/// `/proc/<pid>/cmdline` is NUL-separated with a trailing NUL.
fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|b| *b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}

/// Shells out to `ps`.
#[derive(Debug, Clone, Default)]
pub struct PsTable;

impl ProcessTable for PsTable {
    fn snapshot(&self) -> Result<Vec<ProcessInfo>> {
        let output = Command::new("ps")
            .args(["-eo", "pid=,args="])
            .output()
            .context("running ps")?;
        if !output.status.success() {
            bail!("ps exited with {}", output.status);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let out = parse_ps_output(&text);
        debug!(count = out.len(), "process table snapshot (ps)");
        Ok(out)
    }
}

fn parse_ps_output(text: &str) -> Vec<ProcessInfo> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (pid, args) = line.split_once(char::is_whitespace)?;
            let pid = pid.parse::<u32>().ok()?;
            let args = args.trim();
            (!args.is_empty()).then(|| ProcessInfo::from_cmdline(pid, args))
        })
        .collect()
}

/// procfs where available, `ps` otherwise.
pub fn system_table() -> Box<dyn ProcessTable> {
    if Path::new("/proc/self/cmdline").exists() {
        Box::new(ProcfsTable::new())
    } else {
        Box::new(PsTable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn contains_requires_every_token() {
        let info = ProcessInfo::from_argv(10, argv(&["python3", "/opt/watchers/gmail_watcher.py"]));
        assert!(matches(&argv(&["python3", "gmail_watcher.py"]), &info, MatchMode::Contains));
        assert!(!matches(&argv(&["python3", "file_watcher.py"]), &info, MatchMode::Contains));
    }

    #[test]
    fn exact_compares_argv() {
        let info = ProcessInfo::from_argv(10, argv(&["python3", "/opt/watchers/gmail_watcher.py"]));
        assert!(!matches(&argv(&["python3", "gmail_watcher.py"]), &info, MatchMode::Exact));
        assert!(matches(
            &argv(&["python3", "/opt/watchers/gmail_watcher.py"]),
            &info,
            MatchMode::Exact
        ));
    }

    #[test]
    fn exact_without_argv_falls_back_to_contains() {
        let info = ProcessInfo::from_cmdline(10, "python3 /opt/watchers/gmail_watcher.py");
        assert!(matches(&argv(&["python3", "gmail_watcher.py"]), &info, MatchMode::Exact));
    }

    #[test]
    fn empty_identity_matches_nothing() {
        let info = ProcessInfo::from_cmdline(1, "init");
        assert!(!matches(&[], &info, MatchMode::Contains));
    }

    #[test]
    fn parses_nul_separated_cmdline() {
        assert_eq!(
            parse_cmdline(b"python3\0watcher.py\0--vault\0/v\0"),
            argv(&["python3", "watcher.py", "--vault", "/v"])
        );
        assert!(parse_cmdline(b"").is_empty());
    }

    #[test]
    fn parses_ps_lines() {
        let parsed = parse_ps_output("    1 /sbin/init\n  4242 python3 watcher.py --flag\n  99 \n");
        assert_eq!(
            parsed,
            vec![
                ProcessInfo::from_cmdline(1, "/sbin/init"),
                ProcessInfo::from_cmdline(4242, "python3 watcher.py --flag"),
            ]
        );
    }

    #[test]
    fn procfs_table_reads_fake_root() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("321");
        fs::create_dir_all(&p).unwrap();
        fs::write(p.join("cmdline"), b"sleep\x00600\x00").unwrap();
        fs::create_dir_all(dir.path().join("self")).unwrap();
        fs::create_dir_all(dir.path().join("2")).unwrap();
        fs::write(dir.path().join("2").join("cmdline"), b"").unwrap();

        let snapshot = ProcfsTable::with_root(dir.path()).snapshot().unwrap();
        assert_eq!(snapshot, vec![ProcessInfo::from_argv(321, argv(&["sleep", "600"]))]);
    }
}

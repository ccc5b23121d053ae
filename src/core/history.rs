//! Run history.
//!
//! Every logged run appends a [`HistoryEntry`] to a JSON file under the
//! ScriptHaus home directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// How a history entry was run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// A command from a playbook
    Playbook,
    /// A standalone script file
    Script,
}

/// A single recorded run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Sequential id, 1-based
    pub history_id: u64,

    /// Start time, Unix epoch milliseconds
    pub ts: i64,

    /// ScriptHaus version that ran it
    pub version: String,

    pub run_type: RunType,

    /// Absolute path of the playbook or script
    pub script_path: PathBuf,

    /// Canonical playbook name, or the script path as typed
    pub script_file: String,

    /// Command name within the playbook (empty for scripts)
    #[serde(default)]
    pub script_name: String,

    /// Interpreter language
    pub script_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,

    /// Directory the script ran in
    pub cwd: PathBuf,

    #[serde(default)]
    pub sys_user: String,

    /// Extra arguments passed to the script
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl HistoryEntry {
    /// A fresh entry stamped with the current time, working directory and user.
    pub fn new(run_type: RunType, script_path: PathBuf, script_file: impl Into<String>) -> Self {
        Self {
            history_id: 0,
            ts: Local::now().timestamp_millis(),
            version: crate::VERSION.to_string(),
            run_type,
            script_path,
            script_file: script_file.into(),
            script_name: String::new(),
            script_type: String::new(),
            project_dir: None,
            cwd: std::env::current_dir().unwrap_or_default(),
            sys_user: std::env::var("USER").unwrap_or_default(),
            args: Vec::new(),
            duration_ms: None,
            exit_code: None,
        }
    }

    /// Record how the run ended.
    pub fn finish(&mut self, duration: Duration, exit_code: i32) {
        self.duration_ms = Some(duration.as_millis() as u64);
        self.exit_code = Some(exit_code);
    }

    /// `playbook::command` for playbook runs, the script path otherwise.
    pub fn script_string(&self) -> String {
        match self.run_type {
            RunType::Playbook => {
                if self.script_file == "^" || self.script_file.chars().all(|c| c == '.') {
                    format!("{}{}", self.script_file, self.script_name)
                } else {
                    format!("{}::{}", self.script_file, self.script_name)
                }
            }
            RunType::Script => self.script_file.clone(),
        }
    }

    fn timestamp(&self) -> Option<DateTime<Local>> {
        DateTime::from_timestamp_millis(self.ts).map(|t| t.with_timezone(&Local))
    }

    /// One-line rendering: id, script and quoted arguments.
    pub fn compact_string(&self) -> String {
        format!("{:5}  {}", self.history_id, self.command_line())
    }

    /// Multi-line rendering with time, directory, duration and exit code.
    pub fn full_string(&self) -> String {
        let ts = self
            .timestamp()
            .map(|t| t.format("[%Y-%m-%d %H:%M:%S]").to_string())
            .unwrap_or_default();
        let mut details = format!("       cwd: {}", self.cwd.display());
        if let Some(ms) = self.duration_ms {
            details.push_str(&format!(" | duration: {:.3}s", ms as f64 / 1000.0));
        }
        if let Some(code) = self.exit_code {
            details.push_str(&format!(" | exitcode: {code}"));
        }
        format!(
            "{:5}  {ts} {}\n{details}\n       user: {} | type: {}\n",
            self.history_id,
            self.command_line(),
            self.sys_user,
            self.script_type
        )
    }

    fn command_line(&self) -> String {
        let mut line = self.script_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }
}

/// Quote `arg` for display as a shell word.
fn shell_quote(arg: &str) -> String {
    match shlex::try_quote(arg) {
        Ok(quoted) => quoted.into_owned(),
        Err(_) => format!("{arg:?}"),
    }
}

/// Stored history data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    /// Version for future migrations
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: Vec<HistoryEntry>,
}

/// History file manager.
#[derive(Debug)]
pub struct HistoryManager {
    /// Path to the history file
    history_path: PathBuf,
    history: HistoryFile,
    /// Maximum number of entries to keep
    max_entries: usize,
}

impl HistoryManager {
    /// Open the history file at `path`; a missing file is an empty history.
    pub fn with_path(path: PathBuf, max_entries: usize) -> anyhow::Result<Self> {
        let history = Self::load_history(&path)?;
        Ok(Self { history_path: path, history, max_entries })
    }

    fn load_history(path: &Path) -> anyhow::Result<HistoryFile> {
        if !path.exists() {
            return Ok(HistoryFile::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read history file '{}'", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid history file '{}'", path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.history_path
    }

    /// Save history to file.
    pub fn save(&self) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(&self.history)?;
        if let Some(parent) = self.history_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create directory '{}'", parent.display()))?;
        }
        fs::write(&self.history_path, content)
            .with_context(|| format!("cannot write history file '{}'", self.history_path.display()))?;
        Ok(())
    }

    /// Append `entry` with the next id and prune; returns the id.
    pub fn record(&mut self, mut entry: HistoryEntry) -> u64 {
        let next_id = self.history.entries.last().map_or(1, |e| e.history_id + 1);
        entry.history_id = next_id;
        self.history.entries.push(entry);
        self.prune_old_entries();
        next_id
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.history.entries
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> &[HistoryEntry] {
        let entries = &self.history.entries;
        &entries[entries.len().saturating_sub(limit)..]
    }

    fn prune_old_entries(&mut self) {
        let excess = self.history.entries.len().saturating_sub(self.max_entries);
        if excess > 0 {
            tracing::debug!(removed = excess, "pruning history");
            self.history.entries.drain(..excess);
        }
    }

    /// Remove every entry; returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.history.entries.len();
        self.history.entries.clear();
        removed
    }

    /// Remove entries with ids in `start..=end`; returns how many were removed.
    pub fn remove_range(&mut self, start: u64, end: u64) -> anyhow::Result<usize> {
        if start == 0 || end == 0 {
            bail!("invalid history ids {start} {end}, both must be positive");
        }
        if end < start {
            return Ok(0);
        }
        let before = self.history.entries.len();
        self.history.entries.retain(|e| e.history_id < start || e.history_id > end);
        Ok(before - self.history.entries.len())
    }

    /// Renumber entries 1..=n in timestamp order.
    pub fn renumber(&mut self) {
        self.history.entries.sort_by_key(|e| e.ts);
        for (idx, entry) in self.history.entries.iter_mut().enumerate() {
            entry.history_id = idx as u64 + 1;
        }
    }

    /// Delete the history file from disk.
    pub fn delete_file(path: &Path) -> anyhow::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("cannot remove history file '{}'", path.display()))
            }
        }
    }
}

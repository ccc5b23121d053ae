//! Configuration management for ScriptHaus.
//!
//! Handles loading configuration from TOML files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Project-local config file name.
pub const LOCAL_CONFIG_FILE: &str = ".scripthaus.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Run history settings
    pub history: HistoryConfig,

    /// Playbook name resolution settings
    pub resolver: ResolverConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Suppress `[^scripthaus]` status lines
    pub quiet: bool,

    /// Print extraction and directive warnings
    pub show_warnings: bool,
}

/// Run history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Whether runs are recorded at all
    pub enabled: bool,

    /// Oldest entries are pruned past this count
    pub max_entries: usize,

    /// History file; `~` and `$VARS` are expanded. Defaults to
    /// `<scripthaus home>/history.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Name resolution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Fail on permission errors while searching for project roots
    pub strict_permissions: bool,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.scripthaus.toml` in current directory
    /// 2. `~/.config/scripthaus/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        match Self::locate() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// The config file `load` would read, if any exists.
    pub fn locate() -> Option<PathBuf> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }
        Self::global_path().filter(|path| path.exists())
    }

    /// Path of the global config file.
    pub fn global_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file '{}'", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("scripthaus"))
    }

    /// History file location, given the ScriptHaus home directory.
    pub fn history_path(&self, scripthaus_home: &Path) -> anyhow::Result<PathBuf> {
        match &self.history.path {
            Some(path) => {
                let expanded = shellexpand::full(path)
                    .with_context(|| format!("cannot expand history path '{path}'"))?;
                Ok(PathBuf::from(expanded.as_ref()))
            }
            None => Ok(scripthaus_home.join("history.json")),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { quiet: false, show_warnings: true }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { enabled: true, max_entries: 1000, path: None }
    }
}

// Configuration loading for taskbot

use crate::store::DEFAULT_PAGE_SIZE;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const APP_DIR: &str = "taskbot";
const CONFIG_FILE: &str = "config.yml";
const DB_FILE: &str = "tasks.db";

/// Runtime settings, read from YAML with every field optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Tasks shown per `!list` page
    pub page_size: u32,
    /// Minimum seconds between two `!add` commands from the same user
    pub add_cooldown_secs: u64,
    /// Prefix that marks a chat message as a command
    pub prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            page_size: DEFAULT_PAGE_SIZE,
            add_cooldown_secs: 5,
            prefix: "!".to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit file, else the per-user config file if present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path),
                None => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading config");
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        Ok(config)
    }

    pub fn add_cooldown(&self) -> Duration {
        Duration::from_secs(self.add_cooldown_secs)
    }
}

/// `<config_dir>/taskbot/config.yml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// `<data_dir>/taskbot/tasks.db`, or `tasks.db` in the working directory
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join(DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DB_FILE))
}

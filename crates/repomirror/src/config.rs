//! Orchestrator configuration.
//!
//! Loaded from an optional YAML file; every field has a default so an empty
//! file (or no file at all) is a valid configuration.
//!
//! ```yaml
//! baseDir: /home/me/mirrors
//! defaultBranch: main
//! timeouts:
//!   fetch: 30
//!   clone: 0   # unbounded
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Settings threaded explicitly into the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Directory holding one working copy per repository.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Version-control executable.
    #[serde(default = "default_git_program")]
    pub git_program: String,

    /// Branch assumed when the current branch cannot be determined.
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Per-operation time budgets.
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("repomirror")
}

fn default_git_program() -> String {
    "git".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            git_program: default_git_program(),
            default_branch: default_branch(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Default settings with a specific base directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Reads and parses a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SyncError::ReadConfig {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_yaml(&content).map_err(|e| SyncError::ParseConfig {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads `path` when given and present, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                log::info!("Config file {:?} not found, using defaults", path);
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

/// Time budgets in seconds. `0` means wait indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSettings {
    #[serde(default)]
    pub clone: u64,
    #[serde(default = "default_status_timeout")]
    pub status: u64,
    #[serde(default = "default_diff_timeout")]
    pub diff: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch: u64,
    #[serde(default = "default_network_timeout")]
    pub pull: u64,
    #[serde(default = "default_network_timeout")]
    pub push: u64,
    /// Stage, commit, branch lookup and count queries.
    #[serde(default = "default_local_timeout")]
    pub local: u64,
}

fn default_status_timeout() -> u64 {
    20
}

fn default_diff_timeout() -> u64 {
    20
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_network_timeout() -> u64 {
    120
}

fn default_local_timeout() -> u64 {
    120
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            clone: 0,
            status: default_status_timeout(),
            diff: default_diff_timeout(),
            fetch: default_fetch_timeout(),
            pull: default_network_timeout(),
            push: default_network_timeout(),
            local: default_local_timeout(),
        }
    }
}

/// Converts a seconds setting into a runner timeout.
pub fn budget(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

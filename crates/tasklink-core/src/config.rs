//! Project configuration from `.tasklink/config.toml`.
//!
//! Every key is optional; a missing file yields defaults.
//! `TASKLINK_LOCK_TIMEOUT_MS` wins over `[lock] timeout_ms`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the store, lock files, and config.
pub const STATE_DIR: &str = ".tasklink";
/// Store file name inside [`STATE_DIR`].
pub const DB_FILE: &str = "tasklink.db";
/// Config file name inside [`STATE_DIR`].
pub const CONFIG_FILE: &str = "config.toml";
/// Lock directory name inside [`STATE_DIR`].
pub const LOCK_DIR: &str = "locks";

/// Env var overriding `[lock] timeout_ms`.
pub const LOCK_TIMEOUT_ENV: &str = "TASKLINK_LOCK_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Longest wait for a project lock before failing with lock contention.
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// `pretty`, `text`, or `json`. Unset means "detect from the terminal".
    #[serde(default)]
    pub format: Option<String>,
}

/// Settings resolved from file, environment, and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub lock_timeout: Duration,
    pub busy_timeout: Duration,
}

/// Filesystem layout of an initialized project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub root: PathBuf,
}

impl StorePaths {
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: project_root.join(STATE_DIR),
        }
    }

    #[must_use]
    pub fn db(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    #[must_use]
    pub fn config(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    #[must_use]
    pub fn locks(&self) -> PathBuf {
        self.root.join(LOCK_DIR)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.root.is_dir()
    }
}

/// Load `.tasklink/config.toml`, or defaults if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = StorePaths::new(project_root).config();
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the effective configuration for one invocation.
///
/// # Errors
///
/// Returns an error if the project config cannot be loaded or an override
/// env var holds a non-numeric value.
pub fn resolve_config(project_root: &Path) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let lock_timeout_ms = resolve_lock_timeout(&project, env::var(LOCK_TIMEOUT_ENV).ok())?;

    Ok(EffectiveConfig {
        lock_timeout: Duration::from_millis(lock_timeout_ms),
        busy_timeout: Duration::from_millis(project.store.busy_timeout_ms),
        project,
    })
}

fn resolve_lock_timeout(project: &ProjectConfig, env_value: Option<String>) -> Result<u64> {
    match env_value {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{LOCK_TIMEOUT_ENV} must be milliseconds, got '{raw}'")),
        None => Ok(project.lock.timeout_ms),
    }
}

/// Default `config.toml` written by `tl init`.
pub const DEFAULT_CONFIG_TOML: &str = r"# tasklink project configuration

[lock]
# Milliseconds to wait for another writer to release a project lock.
timeout_ms = 5000

[store]
# SQLite busy timeout in milliseconds.
busy_timeout_ms = 5000

[output]
# format = 'pretty'
";

const fn default_lock_timeout_ms() -> u64 {
    5_000
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

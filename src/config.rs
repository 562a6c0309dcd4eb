use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default number of local fetch workers
pub const DEFAULT_WORKERS: usize = 10;

/// Default buffer size of the local fetch channel
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default name of the managed task queue
pub const DEFAULT_QUEUE_NAME: &str = "dev-fetch-tasks";

/// Default per-fetch deadline in minutes
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 10;

/// Default module proxy
pub const DEFAULT_PROXY_URL: &str = "https://proxy.golang.org";

/// Where fetch tasks are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// In-process worker pool
    #[default]
    Local,
    /// External task service calling back into `fetch`
    Managed,
}

/// Runtime configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub mode: DeploymentMode,
    pub workers: usize,
    pub queue_capacity: usize,
    pub queue_name: String,
    /// Base URL of the managed task service; required in managed mode
    pub task_endpoint: Option<String>,
    pub proxy_url: String,
    pub timeout_minutes: u64,
    /// File listing `module@version` pairs the proxy no longer serves
    pub proxy_removed_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::default(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            task_endpoint: None,
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            proxy_removed_path: None,
            db_path: None,
        }
    }
}

impl Config {
    /// Read the JSON file at `path` (defaults when `None`) and apply
    /// `MODSEARCH_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from variables returned by `lookup`. Empty values are ignored.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("MODSEARCH_TIMEOUT_MINUTES") {
            self.timeout_minutes = parse_value("MODSEARCH_TIMEOUT_MINUTES", &value)?;
        }
        if let Some(value) = var("MODSEARCH_TASK_QUEUE") {
            self.queue_name = value;
        }
        if let Some(value) = var("MODSEARCH_PROXY_REMOVED") {
            self.proxy_removed_path = Some(PathBuf::from(value));
        }
        if let Some(value) = var("MODSEARCH_MODE") {
            self.mode = DeploymentMode::from_str(value.trim(), true).map_err(|_| {
                ConfigError::InvalidValue {
                    key: "MODSEARCH_MODE".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = var("MODSEARCH_PROXY_URL") {
            self.proxy_url = value;
        }
        if let Some(value) = var("MODSEARCH_TASK_ENDPOINT") {
            self.task_endpoint = Some(value);
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }

    /// Configured database path, or the default under [`data_dir`]
    pub fn database_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(db_path)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Returns the path to the data directory for modsearch.
/// Uses $XDG_DATA_HOME/modsearch if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/modsearch,
/// or ./modsearch if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("modsearch.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("modsearch.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("modsearch")
}

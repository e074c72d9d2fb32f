use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_STALE_MS;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub github: GithubConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
  /// GraphQL endpoint (GitHub Enterprise: https://HOST/api/graphql)
  #[serde(default = "default_graphql_url")]
  pub graphql_url: String,
  /// Transport timeout for a single API call
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for GithubConfig {
  fn default() -> Self {
    Self {
      graphql_url: default_graphql_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_graphql_url() -> String {
  "https://api.github.com/graphql".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  /// Persistent SQLite file
  #[default]
  Sqlite,
  /// Process memory only
  Memory,
  /// No caching - every lookup goes to the API
  #[serde(rename = "none")]
  Disabled,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: StoreBackend,
  /// SQLite file location (defaults to the user data directory)
  pub path: Option<PathBuf>,
  /// Seconds before a cached repository is refreshed in the background
  pub ttl_secs: Option<u64>,
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    self
      .ttl_secs
      .and_then(|secs| i64::try_from(secs).ok())
      .and_then(Duration::try_seconds)
      .unwrap_or_else(|| Duration::milliseconds(DEFAULT_STALE_MS))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter directive; RUST_LOG takes precedence
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write logs to a daily file in this directory instead of stderr
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      dir: None,
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./prlens.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/prlens/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("prlens.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("prlens").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is a valid "all defaults" config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }
}

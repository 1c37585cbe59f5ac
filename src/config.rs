use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub directory: DirectoryConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
  /// Base URL of the people/group directory API
  pub url: String,
  /// Request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  10
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Prefix for every durable cache key
  pub namespace: String,
  pub memory_ttl_secs: u64,
  pub durable_ttl_secs: u64,
  pub max_memory_entries: usize,
  /// How often expired memory entries are swept
  pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let settings = CacheSettings::default();
    Self {
      namespace: settings.namespace,
      memory_ttl_secs: settings.memory_ttl.num_seconds().max(0) as u64,
      durable_ttl_secs: settings.durable_ttl.num_seconds().max(0) as u64,
      max_memory_entries: settings.max_memory_entries,
      sweep_interval_secs: settings.sweep_interval.as_secs(),
    }
  }
}

impl CacheConfig {
  pub fn to_settings(&self) -> CacheSettings {
    CacheSettings {
      namespace: self.namespace.clone(),
      memory_ttl: chrono::Duration::seconds(self.memory_ttl_secs.min(i64::MAX as u64) as i64),
      durable_ttl: chrono::Duration::seconds(self.durable_ttl_secs.min(i64::MAX as u64) as i64),
      max_memory_entries: self.max_memory_entries,
      sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file for the durable tier (defaults to the user data dir)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./invlens.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/invlens/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/invlens/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("invlens.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("invlens").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    url::Url::parse(&config.directory.url)
      .map_err(|e| eyre!("Invalid directory url {}: {}", config.directory.url, e))?;
    Ok(config)
  }

  /// Get the directory API token from environment variables.
  ///
  /// Checks INVLENS_DIRECTORY_TOKEN first, then DIRECTORY_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("INVLENS_DIRECTORY_TOKEN")
      .or_else(|_| std::env::var("DIRECTORY_API_TOKEN"))
      .map_err(|_| {
        eyre!(
          "Directory API token not found. Set INVLENS_DIRECTORY_TOKEN or DIRECTORY_API_TOKEN environment variable."
        )
      })
  }
}

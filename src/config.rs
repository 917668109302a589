use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::cache::{PartitionNames, SqliteStorage};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Prefix of every partition name
  pub app_name: String,
  /// Bump to evict all partitions of the previous version on activation
  pub cache_version: u32,
  /// Origin and base path the worker controls
  pub scope: String,
  /// Install manifest; also the exact-path static allow-list
  pub static_assets: Vec<String>,
  /// Hosts (and their subdomains) whose requests are never intercepted
  #[serde(deserialize_with = "deserialize_lowercase_set")]
  pub excluded_hosts: BTreeSet<String>,
  /// Hosts (and their subdomains) treated as backend API calls
  #[serde(deserialize_with = "deserialize_lowercase_set")]
  pub api_hosts: BTreeSet<String>,
  #[serde(deserialize_with = "deserialize_lowercase_set")]
  pub image_extensions: BTreeSet<String>,
  /// Served for failed navigations, from the static partition
  pub offline_page: String,
  /// Served for failed image requests, from the static partition
  pub placeholder_image: String,
  pub notification: NotificationDefaults,
  /// SQLite cache file (default: $XDG_DATA_HOME/flow-offline/cache.db)
  pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationDefaults {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
}

impl Default for NotificationDefaults {
  fn default() -> Self {
    Self {
      title: "Flow".to_string(),
      body: "You have a new update in Flow".to_string(),
      icon: "/icons/icon-192x192.png".to_string(),
      badge: "/icons/badge-72x72.png".to_string(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    fn strings<T: FromIterator<String>>(items: &[&str]) -> T {
      items.iter().map(|s| s.to_string()).collect()
    }

    Self {
      app_name: "flow".to_string(),
      cache_version: 1,
      scope: "http://localhost:8080/".to_string(),
      static_assets: strings(&[
        "/",
        "/index.html",
        "/offline.html",
        "/manifest.json",
        "/css/styles.css",
        "/js/app.js",
        "/js/firebase-config.js",
        "/images/placeholder.svg",
        "/icons/icon-192x192.png",
      ]),
      excluded_hosts: strings(&[
        "firebaseapp.com",
        "firebaseio.com",
        "googleapis.com",
        "gstatic.com",
        "google-analytics.com",
        "googletagmanager.com",
      ]),
      api_hosts: strings(&["cloudfunctions.net"]),
      image_extensions: strings(&["png", "jpg", "jpeg", "gif", "webp", "svg", "ico"]),
      offline_page: "/offline.html".to_string(),
      placeholder_image: "/images/placeholder.svg".to_string(),
      notification: NotificationDefaults::default(),
      database: None,
    }
  }
}

fn deserialize_lowercase_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(
    v.into_iter()
      .map(|s| s.trim_start_matches('.').to_lowercase())
      .collect(),
  )
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./flow-offline.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/flow-offline/config.yaml
  ///
  /// Built-in defaults are used when no file is found.
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
      None => {
        debug!("No configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("flow-offline.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("flow-offline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.scope_url()?;
    Ok(config)
  }

  pub fn scope_url(&self) -> Result<Url> {
    Url::parse(&self.scope).map_err(|e| eyre!("Invalid scope URL '{}': {}", self.scope, e))
  }

  pub fn partition_names(&self) -> PartitionNames {
    PartitionNames::new(&self.app_name, self.cache_version)
  }

  /// Cache database location.
  ///
  /// Checks FLOW_OFFLINE_DATABASE first, then the config file, then the
  /// platform data directory.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FLOW_OFFLINE_DATABASE") {
      return Ok(PathBuf::from(path));
    }

    match &self.database {
      Some(path) => Ok(path.clone()),
      None => SqliteStorage::default_path(),
    }
  }
}

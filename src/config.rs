use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub store: StoreConfig,
  #[serde(default)]
  pub auth: AuthConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Routine preselected by the catalog and logging views
  pub default_routine: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Project base URL, e.g. https://abc.supabase.co
  pub url: String,
  /// Public (anon) API key; the environment takes precedence when unset
  pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
  /// OAuth provider used for sign-in
  #[serde(default = "default_provider")]
  pub provider: String,
  /// Origin the provider redirects back to after consent
  #[serde(default = "default_redirect")]
  pub redirect_to: String,
}

impl Default for AuthConfig {
  fn default() -> Self {
    Self {
      provider: default_provider(),
      redirect_to: default_redirect(),
    }
  }
}

fn default_provider() -> String {
  "google".to_string()
}

fn default_redirect() -> String {
  "http://localhost:3000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  /// Minutes a fetched result is served without contacting the store
  #[serde(default = "default_stale_minutes")]
  pub stale_minutes: i64,
  /// Hours an unused entry stays in memory (and in the persisted snapshot)
  #[serde(default = "default_gc_hours")]
  pub gc_hours: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: default_enabled(),
      stale_minutes: default_stale_minutes(),
      gc_hours: default_gc_hours(),
    }
  }
}

fn default_enabled() -> bool {
  true
}

fn default_stale_minutes() -> i64 {
  5
}

fn default_gc_hours() -> i64 {
  24
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./worklog.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/worklog/config.yaml
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
        "No configuration file found. Create one at ~/.config/worklog/config.yaml\n\
                 with at least:\n\n  store:\n    url: https://<project>.supabase.co"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("worklog.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("worklog").join("config.yaml");
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

  pub(crate) fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Public API key: config file first, then WORKLOG_API_KEY, then SUPABASE_ANON_KEY.
  pub fn api_key(&self) -> Result<String> {
    if let Some(key) = &self.store.api_key {
      return Ok(key.clone());
    }
    std::env::var("WORKLOG_API_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!("Store API key not found. Set store.api_key or the WORKLOG_API_KEY environment variable.")
      })
  }

  /// Bearer token of the identity provider session, if signed in.
  pub fn get_access_token() -> Option<String> {
    std::env::var("WORKLOG_ACCESS_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  /// Directory for the cache database and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("worklog"))
  }
}

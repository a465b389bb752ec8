use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub github: GithubConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub paging: PagingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
  /// API root, e.g. https://ghe.example.com/api/v3 for Enterprise
  pub url: String,
  /// Applied to both connect and whole-request timeouts
  pub timeout_secs: u64,
}

impl Default for GithubConfig {
  fn default() -> Self {
    Self {
      url: "https://api.github.com/".to_string(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  /// Database file (default: $XDG_DATA_HOME/ghusers/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
  pub page_size: usize,
}

impl Default for PagingConfig {
  fn default() -> Self {
    Self { page_size: 50 }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ghusers.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ghusers/config.yaml
  ///
  /// Without any file the defaults are used; the public API needs no setup.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let config = match Self::locate(explicit_path)? {
      Some(path) => Self::parse(&path)?,
      None => Config::default(),
    };
    config.validate()?;

    Ok(config)
  }

  /// Implicit config files, most specific first.
  fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("ghusers.yaml")];
    paths.extend(dirs::config_dir().map(|dir| dir.join("ghusers").join("config.yaml")));
    paths
  }

  /// An explicit path must exist. Otherwise the first existing candidate
  /// wins, and `None` means run on defaults.
  fn locate(explicit_path: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit_path {
      Some(p) if p.exists() => Ok(Some(p.to_path_buf())),
      Some(p) => Err(eyre!("Config file not found: {}", p.display())),
      None => Ok(Self::candidates().into_iter().find(|p| p.exists())),
    }
  }

  fn parse(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn validate(&self) -> Result<()> {
    if self.paging.page_size == 0 {
      return Err(eyre!("paging.page_size must be at least 1"));
    }
    if self.github.timeout_secs == 0 {
      return Err(eyre!("github.timeout_secs must be at least 1"));
    }
    Ok(())
  }

  /// Get the GitHub token from environment variables.
  ///
  /// Checks GHUSERS_GITHUB_TOKEN first, then GITHUB_TOKEN as fallback.
  /// Unauthenticated access works, just with a much lower rate limit.
  pub fn github_token() -> Option<String> {
    std::env::var("GHUSERS_GITHUB_TOKEN")
      .or_else(|_| std::env::var("GITHUB_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

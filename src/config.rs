use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable that overrides `gitlab.token`.
pub const TOKEN_ENV: &str = "GITLAB_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub gitlab: GitLabConfig,
  #[serde(default)]
  pub poll: PollConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabConfig {
  /// Base URL of the GitLab instance, e.g. https://gitlab.example.com
  pub url: String,
  pub token: Option<String>,
  /// Minimum spacing between fleet refreshes, in milliseconds
  #[serde(default = "default_interval")]
  pub interval: u64,
  /// Project inclusion patterns: `group/project`, `group/*` or `*/*`
  #[serde(default = "default_slugs")]
  pub slugs: Vec<String>,
  /// Appended verbatim to the project list query, e.g. `&membership=true`
  #[serde(default)]
  pub additional_query: String,
  #[serde(default)]
  pub debug: bool,
  /// PEM bundle with extra trust anchors for self-hosted instances
  #[serde(default, alias = "caPath")]
  pub ca_path: Option<PathBuf>,
}

/// Settings for the consumer loop in the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
  #[serde(default = "default_poll_every")]
  pub every_ms: u64,
}

impl Default for PollConfig {
  fn default() -> Self {
    Self {
      every_ms: default_poll_every(),
    }
  }
}

fn default_interval() -> u64 {
  15_000
}

fn default_slugs() -> Vec<String> {
  vec!["*/*".to_string()]
}

fn default_poll_every() -> u64 {
  5_000
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./labwatch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/labwatch/config.yaml
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
        "No configuration file found. Create one at ~/.config/labwatch/config.yaml\n\
                 See labwatch.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("labwatch.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("labwatch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse and validate configuration from YAML text.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;

    config.gitlab.base_url()?;
    if config.gitlab.slugs.is_empty() {
      return Err(eyre!("gitlab.slugs must not be empty"));
    }

    Ok(config)
  }
}

impl GitLabConfig {
  /// The instance URL, normalized to end with a slash so relative API paths join under it.
  pub fn base_url(&self) -> Result<Url> {
    let mut raw = self.url.trim().to_string();
    if !raw.ends_with('/') {
      raw.push('/');
    }
    Url::parse(&raw).map_err(|e| eyre!("Invalid gitlab.url '{}': {}", self.url, e))
  }

  /// Resolve the API token, preferring the environment over the config file.
  pub fn api_token(&self) -> Result<String> {
    std::env::var(TOKEN_ENV)
      .ok()
      .filter(|t| !t.is_empty())
      .or_else(|| self.token.clone())
      .ok_or_else(|| {
        eyre!(
          "GitLab token not found. Set {} or gitlab.token in the config file.",
          TOKEN_ENV
        )
      })
  }

  pub fn interval(&self) -> Duration {
    Duration::from_millis(self.interval)
  }
}

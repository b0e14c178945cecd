//! Layered `config.json` resolution.
//!
//! Config priority (first existing file wins):
//! working directory (`./config.json`) > project-local (`./.claude-code-router/config.json`)
//! > global (`$CCR_HOME/config.json`, default `~/.claude-code-router/config.json`)
//!
//! A file that exists but cannot be read or parsed is a hard error; lookup
//! does not fall through to the next layer.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::dirs;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config {path:?}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Malformed config {path:?}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

// ============================================================================
// Configuration
// ============================================================================

/// Status line integration settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusLineConfig {
  pub enabled: bool,
}

/// A model provider the router can forward to.
///
/// Only `name` and `models` matter for lifecycle decisions; everything else
/// (base url, key, transformers) is carried through for the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
  pub name: String,
  #[serde(default)]
  pub models: Vec<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Provider {
  /// The model used when this provider is selected by override.
  pub fn default_model(&self) -> Option<&str> {
    self.models.first().map(String::as_str).filter(|m| !m.is_empty())
  }
}

/// Resolved configuration for one invocation.
///
/// Field names follow the on-disk JSON keys. Unknown keys are kept in `extra`
/// so nothing the router needs is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Enable file logging for the service host
  #[serde(rename = "LOG")]
  pub log: bool,

  /// Log level when file logging is enabled (error, warn, info, debug, trace)
  #[serde(rename = "LOG_LEVEL")]
  pub log_level: String,

  /// Key clients must present to the router
  #[serde(rename = "APIKEY", skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,

  /// Router listen host
  #[serde(rename = "HOST")]
  pub host: String,

  /// Router listen port
  #[serde(rename = "PORT")]
  pub port: u16,

  /// Request timeout forwarded to the foreground tool
  #[serde(rename = "API_TIMEOUT_MS")]
  pub api_timeout_ms: u64,

  #[serde(rename = "OPENAI_API_KEY")]
  pub openai_api_key: String,

  #[serde(rename = "OPENAI_BASE_URL")]
  pub openai_base_url: String,

  #[serde(rename = "OPENAI_MODEL")]
  pub openai_model: String,

  #[serde(rename = "Providers")]
  pub providers: Vec<Provider>,

  #[serde(rename = "ANTHROPIC_SMALL_FAST_MODEL", skip_serializing_if = "Option::is_none")]
  pub small_fast_model: Option<String>,

  /// Harden the foreground tool for automation (no tty, no colors)
  #[serde(rename = "NON_INTERACTIVE_MODE")]
  pub non_interactive_mode: bool,

  #[serde(rename = "CLAUDE_PATH", skip_serializing_if = "Option::is_none")]
  pub claude_path: Option<String>,

  #[serde(rename = "MCP_CONFIG_PATH", skip_serializing_if = "Option::is_none")]
  pub mcp_config_path: Option<PathBuf>,

  #[serde(rename = "StatusLine")]
  pub status_line: StatusLineConfig,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      log: false,
      log_level: "info".to_string(),
      api_key: None,
      host: "127.0.0.1".to_string(),
      port: 3456,
      api_timeout_ms: 600_000,
      openai_api_key: String::new(),
      openai_base_url: String::new(),
      openai_model: String::new(),
      providers: Vec::new(),
      small_fast_model: None,
      non_interactive_mode: false,
      claude_path: None,
      mcp_config_path: None,
      status_line: StatusLineConfig::default(),
      extra: Map::new(),
    }
  }
}

impl Config {
  /// Parse a config document
  pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(content)
  }

  /// Look up a provider by exact (case-sensitive) name
  pub fn find_provider(&self, name: &str) -> Option<&Provider> {
    self.providers.iter().find(|p| p.name == name)
  }

  /// Names of all configured providers, in file order
  pub fn provider_names(&self) -> Vec<&str> {
    self.providers.iter().map(|p| p.name.as_str()).collect()
  }

  /// URL the foreground tool should use to reach the router
  pub fn base_url(&self) -> String {
    format!("http://{}:{}", self.host, self.port)
  }
}

// ============================================================================
// Resolution
// ============================================================================

/// Where a resolved config came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
  WorkingDir,
  ProjectLocal,
  Global,
  Default,
}

impl std::fmt::Display for ConfigLayer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ConfigLayer::WorkingDir => write!(f, "working directory"),
      ConfigLayer::ProjectLocal => write!(f, "project-local"),
      ConfigLayer::Global => write!(f, "global"),
      ConfigLayer::Default => write!(f, "built-in defaults"),
    }
  }
}

/// A config together with the layer that produced it
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
  pub config: Config,
  pub layer: ConfigLayer,
  /// File the config was read from (None for defaults)
  pub path: Option<PathBuf>,
}

/// Finds and loads the first existing config layer.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
  cwd: PathBuf,
  home: PathBuf,
}

impl ConfigResolver {
  pub fn new(cwd: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
    Self {
      cwd: cwd.into(),
      home: home.into(),
    }
  }

  /// Resolver rooted at the current directory and the default home root
  pub fn from_env() -> Self {
    Self::new(dirs::current_dir(), dirs::default_home_dir())
  }

  pub fn cwd(&self) -> &Path {
    &self.cwd
  }

  pub fn home(&self) -> &Path {
    &self.home
  }

  /// Candidate files in lookup order
  pub fn candidates(&self) -> Vec<(ConfigLayer, PathBuf)> {
    vec![
      (ConfigLayer::WorkingDir, self.cwd.join(dirs::CONFIG_FILE_NAME)),
      (
        ConfigLayer::ProjectLocal,
        self.cwd.join(dirs::LOCAL_DIR_NAME).join(dirs::CONFIG_FILE_NAME),
      ),
      (ConfigLayer::Global, self.home.join(dirs::CONFIG_FILE_NAME)),
    ]
  }

  /// Resolve the effective config.
  pub async fn resolve(&self) -> Result<Config, ConfigError> {
    Ok(self.resolve_with_source().await?.config)
  }

  /// Resolve the effective config and report which layer won.
  pub async fn resolve_with_source(&self) -> Result<ResolvedConfig, ConfigError> {
    for (layer, path) in self.candidates() {
      if !path.exists() {
        continue;
      }

      let content = tokio::fs::read_to_string(&path).await.map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
      })?;
      let config = Config::from_json(&content).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
      })?;

      debug!(layer = %layer, path = ?path, "Loaded config");
      return Ok(ResolvedConfig {
        config,
        layer,
        path: Some(path),
      });
    }

    debug!("No config file found, using defaults");
    Ok(ResolvedConfig {
      config: Config::default(),
      layer: ConfigLayer::Default,
      path: None,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use tempfile::TempDir;

  fn write_config(dir: &Path, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("config.json"), content).unwrap();
  }

  #[tokio::test]
  async fn test_defaults_when_no_config() {
    let cwd = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    let resolver = ConfigResolver::new(cwd.path(), home.path());

    let resolved = resolver.resolve_with_source().await.unwrap();
    assert_eq!(resolved.layer, ConfigLayer::Default);
    assert!(resolved.path.is_none());
    assert_eq!(resolved.config, Config::default());
    assert!(!resolved.config.non_interactive_mode);
    assert!(!resolved.config.status_line.enabled);
    assert!(resolved.config.api_key.is_none());
  }

  #[tokio::test]
  async fn test_working_dir_wins_over_global() {
    let cwd = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    write_config(cwd.path(), r#"{"OPENAI_MODEL": "local"}"#);
    write_config(home.path(), r#"{"OPENAI_MODEL": "global"}"#);

    let resolved = ConfigResolver::new(cwd.path(), home.path())
      .resolve_with_source()
      .await
      .unwrap();
    assert_eq!(resolved.layer, ConfigLayer::WorkingDir);
    assert_eq!(resolved.config.openai_model, "local");
  }

  #[tokio::test]
  async fn test_project_local_wins_over_global() {
    let cwd = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    write_config(&cwd.path().join(".claude-code-router"), r#"{"PORT": 4000}"#);
    write_config(home.path(), r#"{"PORT": 5000}"#);

    let resolved = ConfigResolver::new(cwd.path(), home.path())
      .resolve_with_source()
      .await
      .unwrap();
    assert_eq!(resolved.layer, ConfigLayer::ProjectLocal);
    assert_eq!(resolved.config.port, 4000);
  }

  #[tokio::test]
  async fn test_global_fallback() {
    let cwd = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    write_config(home.path(), r#"{"NON_INTERACTIVE_MODE": true}"#);

    let resolved = ConfigResolver::new(cwd.path(), home.path())
      .resolve_with_source()
      .await
      .unwrap();
    assert_eq!(resolved.layer, ConfigLayer::Global);
    assert!(resolved.config.non_interactive_mode);
  }

  #[tokio::test]
  async fn test_malformed_config_does_not_fall_back() {
    let cwd = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    write_config(cwd.path(), "{ not json");
    write_config(home.path(), r#"{"OPENAI_MODEL": "global"}"#);

    let err = ConfigResolver::new(cwd.path(), home.path()).resolve().await.unwrap_err();
    match err {
      ConfigError::Parse { path, .. } => assert_eq!(path, cwd.path().join("config.json")),
      other => panic!("expected parse error, got {other:?}"),
    }
  }

  #[test]
  fn test_parse_full_document() {
    let config = Config::from_json(
      r#"{
        "APIKEY": "secret",
        "PORT": 3457,
        "Providers": [
          {"name": "openrouter", "api_base_url": "https://openrouter.ai", "models": ["a/b", "c/d"]},
          {"name": "empty", "models": []}
        ],
        "ANTHROPIC_SMALL_FAST_MODEL": "haiku",
        "CLAUDE_PATH": "/opt/claude",
        "MCP_CONFIG_PATH": "/etc/mcp.json",
        "StatusLine": {"enabled": true},
        "Router": {"default": "openrouter,a/b"}
      }"#,
    )
    .unwrap();

    assert_eq!(config.api_key.as_deref(), Some("secret"));
    assert_eq!(config.base_url(), "http://127.0.0.1:3457");
    assert_eq!(config.provider_names(), vec!["openrouter", "empty"]);
    assert_eq!(config.find_provider("openrouter").unwrap().default_model(), Some("a/b"));
    assert_eq!(config.find_provider("empty").unwrap().default_model(), None);
    assert!(config.find_provider("OpenRouter").is_none());
    assert_eq!(config.small_fast_model.as_deref(), Some("haiku"));
    assert_eq!(config.claude_path.as_deref(), Some("/opt/claude"));
    assert_eq!(config.mcp_config_path, Some(PathBuf::from("/etc/mcp.json")));
    assert!(config.status_line.enabled);
    assert!(config.extra.contains_key("Router"));
    assert!(config.find_provider("openrouter").unwrap().extra.contains_key("api_base_url"));
  }

  #[test]
  fn test_candidate_order() {
    let resolver = ConfigResolver::new("/work", "/home/u/.claude-code-router");
    let layers: Vec<ConfigLayer> = resolver.candidates().into_iter().map(|(layer, _)| layer).collect();
    assert_eq!(
      layers,
      vec![ConfigLayer::WorkingDir, ConfigLayer::ProjectLocal, ConfigLayer::Global]
    );
  }
}

//! Host platform facts the foreground launch depends on.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

/// Variables consulted when launching a session
const LOOKUP_VARS: &[&str] = &["CLAUDE_PATH", "XDG_CONFIG_HOME", "APPDATA"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
  Windows,
  MacOs,
  Linux,
}

impl Platform {
  pub fn current() -> Self {
    if cfg!(windows) {
      Platform::Windows
    } else if cfg!(target_os = "macos") {
      Platform::MacOs
    } else {
      Platform::Linux
    }
  }
}

/// Default location of the Claude desktop MCP config for a platform.
///
/// - Windows: `%APPDATA%\Claude\claude_desktop_config.json` (`~\AppData\Roaming` without APPDATA)
/// - macOS: `~/Library/Application Support/Claude/claude_desktop_config.json`
/// - others: `$XDG_CONFIG_HOME/Claude/claude_desktop_config.json` (`~/.config` without XDG_CONFIG_HOME)
pub fn default_mcp_config_path(platform: Platform, home: &Path, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
  let base = match platform {
    Platform::Windows => lookup("APPDATA")
      .filter(|v| !v.is_empty())
      .map(PathBuf::from)
      .unwrap_or_else(|| home.join("AppData").join("Roaming")),
    Platform::MacOs => home.join("Library").join("Application Support"),
    Platform::Linux => lookup("XDG_CONFIG_HOME")
      .filter(|v| !v.is_empty())
      .map(PathBuf::from)
      .unwrap_or_else(|| home.join(".config")),
  };
  base.join("Claude").join("claude_desktop_config.json")
}

/// Snapshot of the platform, home directory and the few variables a launch reads.
#[derive(Debug, Clone)]
pub struct HostEnv {
  pub platform: Platform,
  pub home: PathBuf,
  vars: HashMap<String, String>,
}

impl HostEnv {
  pub fn new(platform: Platform, home: impl Into<PathBuf>) -> Self {
    Self {
      platform,
      home: home.into(),
      vars: HashMap::new(),
    }
  }

  pub fn from_env() -> Self {
    let vars = LOOKUP_VARS
      .iter()
      .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
      .collect();
    Self {
      platform: Platform::current(),
      home: crate::dirs::user_home_dir(),
      vars,
    }
  }

  pub fn with_var(mut self, name: &str, value: impl Into<String>) -> Self {
    self.vars.insert(name.to_string(), value.into());
    self
  }

  pub fn var(&self, name: &str) -> Option<String> {
    self.vars.get(name).cloned()
  }

  pub fn default_mcp_config_path(&self) -> PathBuf {
    default_mcp_config_path(self.platform, &self.home, |name| self.var(name))
  }
}

//! Environment, settings blob and argv for the foreground Claude Code process.

use std::{collections::BTreeMap, path::PathBuf, process::Stdio};

use serde::Serialize;

use super::platform::Platform;
use crate::domain::config::Config;

/// Fallback key handed to the foreground tool when the router has no APIKEY
const PLACEHOLDER_API_KEY: &str = "test";

/// Variables the router injects into every session.
///
/// These are overlaid on the inherited environment and win over it.
pub fn router_env(config: &Config) -> BTreeMap<String, String> {
  let mut env = BTreeMap::new();
  env.insert("ANTHROPIC_BASE_URL".to_string(), config.base_url());
  env.insert(
    "ANTHROPIC_API_KEY".to_string(),
    config
      .api_key
      .clone()
      .filter(|k| !k.is_empty())
      .unwrap_or_else(|| PLACEHOLDER_API_KEY.to_string()),
  );
  env.insert("API_TIMEOUT_MS".to_string(), config.api_timeout_ms.to_string());
  env.insert("DISABLE_TELEMETRY".to_string(), "true".to_string());
  env.insert("DISABLE_COST_WARNINGS".to_string(), "true".to_string());
  env.insert("NO_PROXY".to_string(), config.host.clone());

  if let Some(model) = config.small_fast_model.as_ref().filter(|m| !m.is_empty()) {
    env.insert("ANTHROPIC_SMALL_FAST_MODEL".to_string(), model.clone());
  }

  if config.non_interactive_mode {
    env.insert("CI".to_string(), "true".to_string());
    env.insert("FORCE_COLOR".to_string(), "0".to_string());
    env.insert("NODE_NO_READLINE".to_string(), "1".to_string());
    env.insert("TERM".to_string(), "dumb".to_string());
  }

  env
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLineSetting {
  #[serde(rename = "type")]
  pub kind: String,
  pub command: String,
  pub padding: u32,
}

/// JSON passed to the foreground tool via `--settings`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFlag {
  pub env: BTreeMap<String, String>,
  /// Forces API-key auth so requests go through the router
  pub primary_provider: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status_line: Option<StatusLineSetting>,
}

impl SettingsFlag {
  pub fn new(config: &Config, env: BTreeMap<String, String>) -> Self {
    let status_line = config.status_line.enabled.then(|| StatusLineSetting {
      kind: "command".to_string(),
      command: "ccr statusline".to_string(),
      padding: 0,
    });
    Self {
      env,
      primary_provider: "api-key".to_string(),
      status_line,
    }
  }

  pub fn to_json(&self) -> String {
    // Only strings and numbers inside, serialization cannot fail
    serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
  }
}

/// Quote one argument for the platform's shell.
///
/// Windows `cmd` gets double quotes with inner quotes backslash-escaped;
/// POSIX shells get single quotes.
pub fn shell_quote(arg: &str, platform: Platform) -> String {
  match platform {
    Platform::Windows => format!("\"{}\"", arg.replace('"', "\\\"")),
    Platform::MacOs | Platform::Linux => format!("'{}'", arg.replace('\'', "'\\''")),
  }
}

/// Fully resolved foreground invocation
#[derive(Debug, Clone)]
pub struct ForegroundCommand {
  pub program: String,
  pub args: Vec<String>,
  /// Router variables overlaid on the inherited environment
  pub env: BTreeMap<String, String>,
  pub settings: SettingsFlag,
  pub mcp_config: Option<PathBuf>,
  pub non_interactive: bool,
  pub platform: Platform,
  /// Directory the tool runs in
  pub current_dir: PathBuf,
}

impl ForegroundCommand {
  /// Arguments after the program: user args, `--settings`, optional `--mcp-config`
  pub fn argv(&self) -> Vec<String> {
    let mut argv = self.args.clone();
    argv.push("--settings".to_string());
    argv.push(self.settings.to_json());
    if let Some(path) = &self.mcp_config {
      argv.push("--mcp-config".to_string());
      argv.push(path.to_string_lossy().into_owned());
    }
    argv
  }

  /// Shell-quoted command line, as `cmd` runs it on Windows and for display elsewhere
  pub fn command_line(&self) -> String {
    let mut line = self.program.clone();
    let mut argv = self.argv().into_iter();
    while let Some(arg) = argv.next() {
      line.push(' ');
      if arg == "--settings" || arg == "--mcp-config" {
        line.push_str(&arg);
        if let Some(value) = argv.next() {
          line.push(' ');
          line.push_str(&shell_quote(&value, self.platform));
        }
      } else {
        line.push_str(&arg);
      }
    }
    line
  }

  /// Build the process command.
  ///
  /// On Windows the tool is usually a `.cmd` shim, so it runs through
  /// `cmd /C` with the pre-quoted command line. Elsewhere it is exec'd directly.
  pub fn to_command(&self) -> tokio::process::Command {
    let mut command = match self.platform {
      Platform::Windows => windows_command(&self.command_line()),
      Platform::MacOs | Platform::Linux => {
        let mut command = std::process::Command::new(&self.program);
        command.args(self.argv());
        command
      }
    };

    command.envs(&self.env).current_dir(&self.current_dir);
    if self.non_interactive {
      command.stdin(Stdio::piped());
    }

    tokio::process::Command::from(command)
  }
}

#[cfg(windows)]
fn windows_command(command_line: &str) -> std::process::Command {
  use std::os::windows::process::CommandExt;

  let mut command = std::process::Command::new("cmd");
  command.arg("/C").raw_arg(command_line);
  command
}

#[cfg(not(windows))]
fn windows_command(command_line: &str) -> std::process::Command {
  let mut command = std::process::Command::new("cmd");
  command.arg("/C").arg(command_line);
  command
}

//! One `ccr code` session: validate, register, start the service, run Claude
//! Code, release.

use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;
use tokio::process::Child;
use tracing::{debug, info, warn};

use super::{
  command::{ForegroundCommand, SettingsFlag, router_env},
  platform::HostEnv,
  signals::SessionSignals,
};
use crate::{
  domain::config::{Config, ConfigError, ConfigResolver},
  lifecycle::{LifecycleController, LifecycleError, LifecycleStore, ServiceLauncher, StopOutcome},
};

/// Printed when the foreground tool cannot be started
pub const INSTALL_HINT: &str = "Make sure Claude Code is installed: npm install -g @anthropic-ai/claude-code";

const DEFAULT_PROGRAM: &str = "claude";

#[derive(Error, Debug)]
pub enum SessionError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error("Provider '{name}' not found in config")]
  UnknownProvider { name: String, available: Vec<String> },
  #[error("Provider '{0}' has no models configured")]
  NoModels(String),
  #[error("Failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },
  #[error("Failed waiting for Claude Code: {0}")]
  Wait(#[source] io::Error),
  #[error(transparent)]
  Service(#[from] LifecycleError),
}

impl SessionError {
  /// Process exit code for this failure
  pub fn exit_code(&self) -> i32 {
    1
  }
}

/// What the user asked for on the command line
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
  pub args: Vec<String>,
  pub provider_override: Option<String>,
  pub strip_system: bool,
}

/// Provider and model a session is pinned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
  pub provider: String,
  pub model: String,
}

/// A validated session, ready to launch. Nothing on disk has changed yet.
#[derive(Debug, Clone)]
pub struct PreparedSession {
  pub config: Config,
  pub command: ForegroundCommand,
  pub selection: Option<ProviderSelection>,
  pub strip_system: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
  /// Exit code of the foreground tool (0 if it had none)
  pub exit_code: i32,
  /// What the release did to the background service
  pub stop: StopOutcome,
}

pub struct SessionRunner {
  resolver: ConfigResolver,
  lifecycle: LifecycleController,
  store: LifecycleStore,
  host_env: HostEnv,
}

impl SessionRunner {
  pub fn new(resolver: ConfigResolver, lifecycle: LifecycleController, store: LifecycleStore) -> Self {
    Self {
      resolver,
      lifecycle,
      store,
      host_env: HostEnv::from_env(),
    }
  }

  pub fn with_host_env(mut self, host_env: HostEnv) -> Self {
    self.host_env = host_env;
    self
  }

  /// Resolve config, validate the override and build the invocation.
  pub async fn prepare(&self, request: SessionRequest) -> Result<PreparedSession, SessionError> {
    let config = self.resolver.resolve().await?;

    let selection = match &request.provider_override {
      Some(name) => Some(select_provider(&config, name)?),
      None => None,
    };

    let env = router_env(&config);
    let command = ForegroundCommand {
      program: self.program(&config),
      args: request.args,
      settings: SettingsFlag::new(&config, env.clone()),
      env,
      mcp_config: self.discover_mcp_config(&config).await,
      non_interactive: config.non_interactive_mode,
      platform: self.host_env.platform,
      current_dir: self.store.project_dir().to_path_buf(),
    };

    Ok(PreparedSession {
      config,
      command,
      selection,
      strip_system: request.strip_system,
    })
  }

  /// Register, make sure the service runs, then run the tool.
  ///
  /// The session is counted before the service is checked or started, and the
  /// registration is rolled back if the service cannot be started. With no
  /// `launcher` the service is left as it is.
  pub async fn start(
    &self,
    prepared: PreparedSession,
    launcher: Option<&dyn ServiceLauncher>,
  ) -> Result<SessionOutcome, SessionError> {
    self.lifecycle.register_session().await;

    if let Some(launcher) = launcher
      && let Err(e) = self.lifecycle.ensure_running(launcher).await
    {
      warn!("Service failed to start: {}", e);
      self.lifecycle.rollback_session().await;
      return Err(e.into());
    }

    self.launch_registered(prepared).await
  }

  /// Register, then run the tool without touching the service.
  pub async fn launch(&self, prepared: PreparedSession) -> Result<SessionOutcome, SessionError> {
    self.lifecycle.register_session().await;
    self.launch_registered(prepared).await
  }

  /// Write signals, run the tool to completion and release. The session must
  /// already be registered.
  async fn launch_registered(&self, prepared: PreparedSession) -> Result<SessionOutcome, SessionError> {
    let mut signals = SessionSignals::new(self.store.clone());
    if let Some(selection) = &prepared.selection {
      signals.write_model_override(&selection.provider, &selection.model).await;
    }
    if prepared.strip_system {
      signals.write_strip_system().await;
    }

    let command = &prepared.command;
    debug!(command = %command.command_line(), "Launching Claude Code");
    let mut child = match command.to_command().spawn() {
      Ok(child) => child,
      Err(source) => {
        signals.clear().await;
        self.lifecycle.rollback_session().await;
        return Err(SessionError::Spawn {
          program: command.program.clone(),
          source,
        });
      }
    };

    if command.non_interactive {
      drop(child.stdin.take());
    }

    let status = wait_for_exit(&mut child).await;

    signals.clear().await;
    let stop = self.lifecycle.release_session().await;

    let status = status.map_err(SessionError::Wait)?;
    let exit_code = status.code().unwrap_or(0);
    info!(exit_code, "Claude Code exited");

    Ok(SessionOutcome { exit_code, stop })
  }

  /// `prepare` then `launch`
  pub async fn run(&self, request: SessionRequest) -> Result<SessionOutcome, SessionError> {
    let prepared = self.prepare(request).await?;
    self.launch(prepared).await
  }

  fn program(&self, config: &Config) -> String {
    config
      .claude_path
      .clone()
      .filter(|p| !p.is_empty())
      .or_else(|| self.host_env.var("CLAUDE_PATH").filter(|p| !p.is_empty()))
      .unwrap_or_else(|| DEFAULT_PROGRAM.to_string())
  }

  /// Configured MCP config if it exists, else the platform default if it exists
  async fn discover_mcp_config(&self, config: &Config) -> Option<PathBuf> {
    let candidates = config
      .mcp_config_path
      .iter()
      .cloned()
      .chain(std::iter::once(self.host_env.default_mcp_config_path()));

    for path in candidates {
      if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        debug!(path = ?path, "Using MCP config");
        return Some(path);
      }
    }
    None
  }
}

fn select_provider(config: &Config, name: &str) -> Result<ProviderSelection, SessionError> {
  let provider = config
    .find_provider(name)
    .ok_or_else(|| SessionError::UnknownProvider {
      name: name.to_string(),
      available: config.provider_names().into_iter().map(String::from).collect(),
    })?;
  let model = provider
    .default_model()
    .ok_or_else(|| SessionError::NoModels(name.to_string()))?;

  Ok(ProviderSelection {
    provider: provider.name.clone(),
    model: model.to_string(),
  })
}

/// Wait for the child, absorbing Ctrl-C so cleanup always runs.
async fn wait_for_exit(child: &mut Child) -> io::Result<ExitStatus> {
  loop {
    tokio::select! {
      status = child.wait() => return status,
      interrupt = tokio::signal::ctrl_c() => match interrupt {
        Ok(()) => info!("Interrupt received, waiting for Claude Code to exit"),
        Err(e) => {
          warn!("Cannot listen for interrupts: {}", e);
          return child.wait().await;
        }
      },
    }
  }
}

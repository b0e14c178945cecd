//! The background service process.
//!
//! `ccr start` runs a [`ServiceHost`] in the foreground. `ccr code` starts one
//! detached through [`CurrentExeLauncher`] when no service is recorded.

use std::{
  io,
  path::PathBuf,
  process::{Command, Stdio},
  time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::lifecycle::{LifecycleError, ServiceLauncher, ServiceRegistry};

/// How often a running host checks that the PID file still names it
const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Owns the PID file for the lifetime of the service process.
#[derive(Debug, Clone)]
pub struct ServiceHost {
  registry: ServiceRegistry,
  pid: u32,
  watch_interval: Duration,
}

impl ServiceHost {
  pub fn new(registry: ServiceRegistry, pid: u32) -> Self {
    Self {
      registry,
      pid,
      watch_interval: DEFAULT_WATCH_INTERVAL,
    }
  }

  /// Host for the current process
  pub fn current(registry: ServiceRegistry) -> Self {
    Self::new(registry, std::process::id())
  }

  pub fn with_watch_interval(mut self, watch_interval: Duration) -> Self {
    self.watch_interval = watch_interval;
    self
  }

  /// Record this process as the service and block until `cancel` fires or
  /// the PID file stops naming this process.
  ///
  /// Refuses to start when another live service is already recorded, or when
  /// a host starting at the same time wrote the file last.
  pub async fn run(&self, cancel: CancellationToken) -> Result<(), LifecycleError> {
    if let Some(existing) = self.registry.running_pid().await
      && existing != self.pid
    {
      return Err(LifecycleError::AlreadyRunning(existing));
    }

    self.registry.write_pid(self.pid).await?;

    // Two hosts can both pass the check above; the last rename wins
    if let Some(winner) = self.registry.read_pid().await
      && winner != self.pid
    {
      info!(pid = self.pid, winner, "Another service recorded itself first");
      return Err(LifecycleError::AlreadyRunning(winner));
    }
    info!(pid = self.pid, "Service started");

    tokio::select! {
      _ = cancel.cancelled() => info!("Shutting down..."),
      recorded = self.wait_until_replaced() => {
        info!(recorded = ?recorded, "PID file no longer names this service, shutting down...");
      }
    }

    self.registry.release_pid(self.pid).await;

    info!(pid = self.pid, "Service shutdown complete");
    Ok(())
  }

  /// Resolves once the PID file is gone or names another process
  async fn wait_until_replaced(&self) -> Option<u32> {
    loop {
      tokio::time::sleep(self.watch_interval).await;
      let recorded = self.registry.read_pid().await;
      if recorded != Some(self.pid) {
        return recorded;
      }
    }
  }

  /// Run until Ctrl-C or SIGTERM
  pub async fn run_until_shutdown_signal(&self) -> Result<(), LifecycleError> {
    let cancel = CancellationToken::new();
    cancel_on_shutdown_signal(cancel.clone());
    self.run(cancel).await
  }
}

/// Cancel `cancel` on Ctrl-C or, on Unix, SIGTERM.
pub fn cancel_on_shutdown_signal(cancel: CancellationToken) {
  tokio::spawn(async move {
    wait_for_shutdown_signal().await;
    cancel.cancel();
  });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
  use tokio::signal::unix::{SignalKind, signal};

  let mut terminate = match signal(SignalKind::terminate()) {
    Ok(terminate) => terminate,
    Err(e) => {
      warn!("Failed to listen for SIGTERM: {}", e);
      if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
      }
      return;
    }
  };

  tokio::select! {
    result = tokio::signal::ctrl_c() => match result {
      Ok(()) => info!("Received ctrl-c, shutting down..."),
      Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
    },
    _ = terminate.recv() => info!("Received SIGTERM, shutting down..."),
  }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!("Received ctrl-c, shutting down..."),
    Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
  }
}

/// Starts the service by re-executing the current binary as `ccr start`.
#[derive(Debug, Clone)]
pub struct CurrentExeLauncher {
  project_dir: PathBuf,
}

impl CurrentExeLauncher {
  /// The service runs in `project_dir`, where its PID file lives
  pub fn new(project_dir: impl Into<PathBuf>) -> Self {
    Self {
      project_dir: project_dir.into(),
    }
  }
}

impl ServiceLauncher for CurrentExeLauncher {
  fn launch(&self) -> io::Result<()> {
    let exe = std::env::current_exe()?;

    let mut command = Command::new(&exe);
    command
      .arg("start")
      .current_dir(&self.project_dir)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null());
    detach(&mut command);

    let child = command.spawn()?;
    info!(pid = child.id(), "Spawned service process");
    Ok(())
  }
}

/// Keep the service out of the session's process group so terminal signals
/// aimed at Claude Code do not reach it.
#[cfg(unix)]
fn detach(command: &mut Command) {
  use std::os::unix::process::CommandExt;
  command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
  use std::os::windows::process::CommandExt;
  use windows_sys::Win32::System::Threading::{CREATE_NEW_PROCESS_GROUP, DETACHED_PROCESS};
  command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

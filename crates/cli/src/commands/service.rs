//! Service commands (start, stop, status)

use std::sync::Arc;

use anyhow::{Context, Result};
use ccr::{
  ServiceHost,
  config::ConfigResolver,
  lifecycle::{LifecycleController, LifecycleError, LifecycleStore, ServiceRegistry, ServiceState, SystemProcesses},
};
use tracing::info;

/// Run the service host in the foreground
pub async fn cmd_start() -> Result<()> {
  let resolved = ConfigResolver::from_env()
    .resolve_with_source()
    .await
    .context("Failed to load config")?;
  info!(
    layer = %resolved.layer,
    endpoint = %resolved.config.base_url(),
    "Starting claude code router service"
  );

  let registry = ServiceRegistry::new(LifecycleStore::from_env(), Arc::new(SystemProcesses));
  match ServiceHost::current(registry).run_until_shutdown_signal().await {
    Ok(()) => Ok(()),
    Err(LifecycleError::AlreadyRunning(pid)) => {
      println!("Service is already running in the background (PID {}).", pid);
      Ok(())
    }
    Err(e) => Err(e).context("Failed to run service"),
  }
}

/// Stop the service regardless of active sessions
pub async fn cmd_stop() -> Result<()> {
  let controller = LifecycleController::new(LifecycleStore::from_env(), Arc::new(SystemProcesses));
  let outcome = controller.force_stop().await;
  println!("{}", outcome);
  Ok(())
}

/// Show service state and file locations
pub async fn cmd_status() -> Result<()> {
  let store = LifecycleStore::from_env();
  let controller = LifecycleController::new(store.clone(), Arc::new(SystemProcesses));
  let state = controller.state().await;

  println!("Claude Code Router Status");
  println!("=========================\n");

  match state {
    ServiceState::Stopped => println!("Status:         stopped"),
    ServiceState::RunningNoClients { pid } | ServiceState::RunningWithClients { pid, .. } => {
      println!("Status:         running");
      println!("PID:            {}", pid);
    }
  }
  println!("Sessions:       {}", controller.counter().get().await);

  match ConfigResolver::from_env().resolve_with_source().await {
    Ok(resolved) => {
      println!("Endpoint:       {}", resolved.config.base_url());
      match &resolved.path {
        Some(path) => println!("Config:         {} ({})", path.display(), resolved.layer),
        None => println!("Config:         {}", resolved.layer),
      }
    }
    Err(e) => println!("Config:         error: {}", e),
  }

  println!("\n--- Files ---");
  println!("PID file:       {}", store.pid_file().display());
  println!("Counter file:   {}", store.reference_count_file().display());

  if matches!(state, ServiceState::Stopped) {
    println!("\nRun `ccr start` or `ccr code` to start the service.");
  }

  Ok(())
}

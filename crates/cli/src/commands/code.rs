//! `ccr code`: run Claude Code through the router

use std::sync::Arc;

use anyhow::Result;
use ccr::{
  CurrentExeLauncher,
  config::ConfigResolver,
  lifecycle::{LifecycleController, LifecycleStore, ServiceLauncher, SystemProcesses},
  session::{INSTALL_HINT, PreparedSession, SessionError, SessionRequest, SessionRunner},
};
use tracing::debug;

/// Run one session and return the exit code for this process
pub async fn cmd_code(
  provider: Option<String>,
  strip_system: bool,
  no_start: bool,
  args: Vec<String>,
) -> Result<i32> {
  let store = LifecycleStore::from_env();
  let lifecycle = LifecycleController::new(store.clone(), Arc::new(SystemProcesses));
  let runner = SessionRunner::new(ConfigResolver::from_env(), lifecycle, store.clone());

  let request = SessionRequest {
    args,
    provider_override: provider,
    strip_system,
  };

  let prepared = match runner.prepare(request).await {
    Ok(prepared) => prepared,
    Err(e) => return Ok(report(&e)),
  };

  print_banner(&prepared);

  let launcher = (!no_start).then(|| CurrentExeLauncher::new(store.project_dir()));
  let launcher = launcher.as_ref().map(|l| l as &dyn ServiceLauncher);

  match runner.start(prepared, launcher).await {
    Ok(outcome) => {
      debug!(stop = %outcome.stop, "Session finished");
      Ok(outcome.exit_code)
    }
    Err(e) => Ok(report(&e)),
  }
}

fn print_banner(prepared: &PreparedSession) {
  if let Some(selection) = &prepared.selection {
    println!("Using provider: {} ({})", selection.provider, selection.model);
  }
  if prepared.strip_system {
    println!("System context will be stripped for this session");
  }
  if let Some(path) = &prepared.command.mcp_config {
    println!("MCP config: {}", path.display());
  }
  debug!(command = %prepared.command.command_line(), "Foreground command");
}

/// Print a session failure and return its exit code
fn report(error: &SessionError) -> i32 {
  eprintln!("Error: {}", error);
  match error {
    SessionError::UnknownProvider { available, .. } => {
      eprintln!("\nAvailable providers:");
      for name in available {
        eprintln!("  - {}", name);
      }
    }
    SessionError::Spawn { .. } => eprintln!("{}", INSTALL_HINT),
    SessionError::Service(_) => {
      eprintln!("Service startup timeout, please manually run `ccr start` to start the service")
    }
    _ => {}
  }
  error.exit_code()
}

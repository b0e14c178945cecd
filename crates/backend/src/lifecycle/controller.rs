//! Reference-counted start/stop decisions for the background service.
//!
//! There is no long-lived controller: every `ccr` invocation builds one over
//! the shared files, makes its decision and exits. The state machine is
//!
//! ```text
//! Stopped ──start──▶ RunningWithClients(n) ──last release──▶ RunningNoClients ──stop──▶ Stopped
//! ```
//!
//! `RunningNoClients` only exists between the final decrement and the stop
//! attempt that immediately follows it. Every step is best-effort and
//! converges toward `Stopped` with a zero count.

use std::{io, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{process::ProcessControl, refcount::ReferenceCounter, registry::ServiceRegistry, store::LifecycleStore};

#[derive(Error, Debug)]
pub enum LifecycleError {
  #[error("Service is already running with PID {0}")]
  AlreadyRunning(u32),
  #[error("Failed to launch service: {0}")]
  Launch(#[source] io::Error),
  #[error("Service did not start within {0:?}")]
  StartTimeout(Duration),
  #[error("IO error: {0}")]
  Io(#[from] io::Error),
}

/// Observed state of the background service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
  Stopped,
  RunningNoClients { pid: u32 },
  RunningWithClients { pid: u32, clients: u64 },
}

impl std::fmt::Display for ServiceState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ServiceState::Stopped => write!(f, "stopped"),
      ServiceState::RunningNoClients { pid } => write!(f, "running (PID {pid}, no active sessions)"),
      ServiceState::RunningWithClients { pid, clients } => {
        write!(f, "running (PID {pid}, {clients} active session(s))")
      }
    }
  }
}

/// Result of a stop attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
  /// Nothing to stop
  NotRunning,
  /// Other sessions still depend on the service
  InUse { clients: u64 },
  /// Termination was delivered and the PID file removed
  Stopped { pid: u32 },
  /// Termination failed; the PID file was removed anyway
  AlreadyStopped,
}

impl std::fmt::Display for StopOutcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      StopOutcome::NotRunning => write!(f, "No service is currently running."),
      StopOutcome::InUse { clients } => write!(f, "Service is still in use by {clients} session(s)."),
      StopOutcome::Stopped { .. } => write!(f, "claude code router service has been successfully stopped."),
      StopOutcome::AlreadyStopped => write!(f, "Failed to stop the service. It may have already been stopped."),
    }
  }
}

/// Starts the background service out of process
pub trait ServiceLauncher: Send + Sync {
  fn launch(&self) -> io::Result<()>;
}

/// How long `ensure_running` waits for a launched service to record its PID
#[derive(Debug, Clone, Copy)]
pub struct StartPolicy {
  pub interval: Duration,
  pub attempts: u32,
}

impl Default for StartPolicy {
  fn default() -> Self {
    Self {
      interval: Duration::from_millis(500),
      attempts: 10,
    }
  }
}

/// Composes the reference counter and service registry into lifecycle decisions.
#[derive(Debug, Clone)]
pub struct LifecycleController {
  counter: ReferenceCounter,
  registry: ServiceRegistry,
  start_policy: StartPolicy,
}

impl LifecycleController {
  pub fn new(store: LifecycleStore, processes: Arc<dyn ProcessControl>) -> Self {
    Self {
      counter: ReferenceCounter::new(store.clone()),
      registry: ServiceRegistry::new(store, processes),
      start_policy: StartPolicy::default(),
    }
  }

  pub fn with_start_policy(mut self, start_policy: StartPolicy) -> Self {
    self.start_policy = start_policy;
    self
  }

  pub fn counter(&self) -> &ReferenceCounter {
    &self.counter
  }

  pub fn registry(&self) -> &ServiceRegistry {
    &self.registry
  }

  /// Current state, derived from the PID file and the counter
  pub async fn state(&self) -> ServiceState {
    let Some(pid) = self.registry.running_pid().await else {
      return ServiceState::Stopped;
    };
    match self.counter.get().await {
      0 => ServiceState::RunningNoClients { pid },
      clients => ServiceState::RunningWithClients { pid, clients },
    }
  }

  /// Register a dependent session. Always counts, whatever the service state.
  pub async fn register_session(&self) -> u64 {
    let clients = self.counter.increment().await;
    info!(clients, "Session registered");
    clients
  }

  /// Release a session and stop the service if it was the last one.
  pub async fn release_session(&self) -> StopOutcome {
    let clients = self.counter.decrement().await;
    info!(clients, "Session released");
    self.stop_if_idle().await
  }

  /// Undo a registration for a session that never started; no stop attempt.
  pub async fn rollback_session(&self) -> u64 {
    let clients = self.counter.decrement().await;
    debug!(clients, "Session registration rolled back");
    clients
  }

  /// Stop the service unless sessions still depend on it.
  pub async fn stop_if_idle(&self) -> StopOutcome {
    if !self.registry.is_running().await {
      info!("No service is currently running");
      return StopOutcome::NotRunning;
    }

    let clients = self.counter.get().await;
    if clients > 0 {
      debug!(clients, "Service still in use, leaving it running");
      return StopOutcome::InUse { clients };
    }

    self.terminate_service().await
  }

  /// Stop the service regardless of the reference count and forget all references.
  pub async fn force_stop(&self) -> StopOutcome {
    let outcome = if self.registry.is_running().await {
      self.terminate_service().await
    } else {
      StopOutcome::NotRunning
    };
    self.counter.reset().await;
    outcome
  }

  /// Make sure the service runs, launching it if needed. Returns its PID.
  pub async fn ensure_running(&self, launcher: &dyn ServiceLauncher) -> Result<u32, LifecycleError> {
    if let Some(pid) = self.registry.running_pid().await {
      debug!(pid, "Service is already running");
      return Ok(pid);
    }

    info!("Service is not running, starting in background...");
    launcher.launch().map_err(LifecycleError::Launch)?;

    let StartPolicy { interval, attempts } = self.start_policy;
    for attempt in 1..=attempts {
      tokio::time::sleep(interval).await;
      if let Some(pid) = self.registry.running_pid().await {
        info!(pid, "Service started");
        return Ok(pid);
      }
      debug!("Waiting for service to start... (attempt {}/{})", attempt, attempts);
    }

    Err(LifecycleError::StartTimeout(interval * attempts))
  }

  /// Signal the recorded PID and remove the PID file, whatever happens.
  async fn terminate_service(&self) -> StopOutcome {
    let result = match self.registry.read_pid().await {
      Some(pid) => self.registry.terminate(pid).map(|()| pid),
      None => Err(io::Error::new(io::ErrorKind::NotFound, "PID file is missing")),
    };
    self.registry.cleanup_pid_file().await;

    match result {
      Ok(pid) => {
        info!(pid, "Service stopped");
        StopOutcome::Stopped { pid }
      }
      Err(e) => {
        warn!("Failed to stop the service, it may have already stopped: {}", e);
        StopOutcome::AlreadyStopped
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;
  use crate::lifecycle::process::fake::FakeProcesses;
  use tempfile::TempDir;

  fn controller(dir: &TempDir, processes: &FakeProcesses) -> LifecycleController {
    LifecycleController::new(LifecycleStore::new(dir.path(), dir.path()), Arc::new(processes.clone()))
  }

  async fn start_service(controller: &LifecycleController, processes: &FakeProcesses, pid: u32) {
    processes.spawn(pid);
    controller.registry().write_pid(pid).await.unwrap();
  }

  #[tokio::test]
  async fn test_state_transitions() {
    let dir = TempDir::new().unwrap();
    let processes = FakeProcesses::new();
    let controller = controller(&dir, &processes);

    assert_eq!(controller.state().await, ServiceState::Stopped);

    start_service(&controller, &processes, 100).await;
    assert_eq!(controller.state().await, ServiceState::RunningNoClients { pid: 100 });

    controller.register_session().await;
    assert_eq!(
      controller.state().await,
      ServiceState::RunningWithClients { pid: 100, clients: 1 }
    );

    assert_eq!(controller.release_session().await, StopOutcome::Stopped { pid: 100 });
    assert_eq!(controller.state().await, ServiceState::Stopped);
  }

  #[tokio::test]
  async fn test_release_without_service_is_noop() {
    let dir = TempDir::new().unwrap();
    let processes = FakeProcesses::new();
    let controller = controller(&dir, &processes);

    controller.register_session().await;
    assert_eq!(controller.release_session().await, StopOutcome::NotRunning);
    assert_eq!(controller.counter().get().await, 0);
    assert!(processes.terminated().is_empty());
  }

  #[tokio::test]
  async fn test_release_with_other_clients_keeps_service() {
    let dir = TempDir::new().unwrap();
    let processes = FakeProcesses::new();
    let controller = controller(&dir, &processes);
    start_service(&controller, &processes, 7).await;

    controller.register_session().await;
    controller.register_session().await;

    assert_eq!(controller.release_session().await, StopOutcome::InUse { clients: 1 });
    assert!(controller.registry().is_running().await);
    assert!(processes.terminated().is_empty());
  }

  #[tokio::test]
  async fn test_failed_termination_still_cleans_up() {
    let dir = TempDir::new().unwrap();
    let processes = FakeProcesses::denying_terminate();
    let controller = controller(&dir, &processes);
    start_service(&controller, &processes, 55).await;

    assert_eq!(controller.stop_if_idle().await, StopOutcome::AlreadyStopped);
    assert!(!dir.path().join(".ccr.pid").exists());
  }

  #[tokio::test]
  async fn test_force_stop_ignores_count() {
    let dir = TempDir::new().unwrap();
    let processes = FakeProcesses::new();
    let controller = controller(&dir, &processes);
    start_service(&controller, &processes, 9).await;
    controller.register_session().await;
    controller.register_session().await;

    assert_eq!(controller.force_stop().await, StopOutcome::Stopped { pid: 9 });
    assert_eq!(processes.terminated(), vec![9]);
    assert_eq!(controller.counter().get().await, 0);
    assert!(!dir.path().join("claude-code-reference-count.txt").exists());
    assert_eq!(controller.force_stop().await, StopOutcome::NotRunning);
  }

  #[tokio::test]
  async fn test_rollback_does_not_stop() {
    let dir = TempDir::new().unwrap();
    let processes = FakeProcesses::new();
    let controller = controller(&dir, &processes);
    start_service(&controller, &processes, 3).await;

    controller.register_session().await;
    assert_eq!(controller.rollback_session().await, 0);
    assert!(controller.registry().is_running().await);
  }

  /// Launcher that "starts" the service by recording a PID directly
  struct FakeLauncher {
    processes: FakeProcesses,
    registry: ServiceRegistry,
    launches: AtomicU32,
    pid: u32,
  }

  impl ServiceLauncher for FakeLauncher {
    fn launch(&self) -> io::Result<()> {
      self.launches.fetch_add(1, Ordering::SeqCst);
      self.processes.spawn(self.pid);
      let registry = self.registry.clone();
      let pid = self.pid;
      tokio::spawn(async move {
        registry.write_pid(pid).await.unwrap();
      });
      Ok(())
    }
  }

  struct FailingLauncher;

  impl ServiceLauncher for FailingLauncher {
    fn launch(&self) -> io::Result<()> {
      Err(io::Error::from(io::ErrorKind::NotFound))
    }
  }

  fn fast_policy() -> StartPolicy {
    StartPolicy {
      interval: Duration::from_millis(10),
      attempts: 20,
    }
  }

  #[tokio::test]
  async fn test_ensure_running_launches_once() {
    let dir = TempDir::new().unwrap();
    let processes = FakeProcesses::new();
    let controller = controller(&dir, &processes).with_start_policy(fast_policy());
    let launcher = FakeLauncher {
      processes: processes.clone(),
      registry: controller.registry().clone(),
      launches: AtomicU32::new(0),
      pid: 321,
    };

    assert_eq!(controller.ensure_running(&launcher).await.unwrap(), 321);
    assert_eq!(controller.ensure_running(&launcher).await.unwrap(), 321);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_ensure_running_times_out() {
    let dir = TempDir::new().unwrap();
    let processes = FakeProcesses::new();
    let controller = controller(&dir, &processes).with_start_policy(StartPolicy {
      interval: Duration::from_millis(5),
      attempts: 3,
    });

    struct SilentLauncher;
    impl ServiceLauncher for SilentLauncher {
      fn launch(&self) -> io::Result<()> {
        Ok(())
      }
    }

    let err = controller.ensure_running(&SilentLauncher).await.unwrap_err();
    assert!(matches!(err, LifecycleError::StartTimeout(_)));

    let err = controller.ensure_running(&FailingLauncher).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Launch(_)));
  }

  #[test]
  fn test_outcome_messages() {
    assert_eq!(StopOutcome::NotRunning.to_string(), "No service is currently running.");
    assert!(StopOutcome::AlreadyStopped.to_string().contains("already been stopped"));
    assert_eq!(
      ServiceState::RunningWithClients { pid: 1, clients: 2 }.to_string(),
      "running (PID 1, 2 active session(s))"
    );
  }
}

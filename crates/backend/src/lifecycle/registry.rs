//! PID file tracking for the background service.

use std::{io, sync::Arc};

use tracing::{debug, info, warn};

use super::{process::ProcessControl, store::LifecycleStore};

/// Records which process runs the background service and whether it is alive.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
  store: LifecycleStore,
  processes: Arc<dyn ProcessControl>,
}

impl ServiceRegistry {
  pub fn new(store: LifecycleStore, processes: Arc<dyn ProcessControl>) -> Self {
    Self { store, processes }
  }

  /// PID recorded on disk, if the file exists and holds a valid id
  pub async fn read_pid(&self) -> Option<u32> {
    let pid = self.store.read_u64(&self.store.pid_file()).await?;
    u32::try_from(pid).ok().filter(|pid| *pid > 0)
  }

  /// Record `pid` as the running service
  pub async fn write_pid(&self, pid: u32) -> io::Result<()> {
    self.store.write_u64(&self.store.pid_file(), u64::from(pid)).await
  }

  /// PID of the live service, if any.
  ///
  /// A PID file that is unreadable or names a dead process is stale: it is
  /// removed and the service is reported as not running.
  pub async fn running_pid(&self) -> Option<u32> {
    let path = self.store.pid_file();
    if !path.exists() {
      return None;
    }

    match self.read_pid().await {
      Some(pid) if self.processes.is_alive(pid) => Some(pid),
      Some(pid) => {
        info!(pid, "Removing stale PID file");
        self.cleanup_pid_file().await;
        None
      }
      None => {
        debug!(path = ?path, "PID file unreadable, treating as stale");
        self.cleanup_pid_file().await;
        None
      }
    }
  }

  pub async fn is_running(&self) -> bool {
    self.running_pid().await.is_some()
  }

  /// Ask the process to terminate
  pub fn terminate(&self, pid: u32) -> io::Result<()> {
    self.processes.terminate(pid)
  }

  /// Delete the PID file. A missing file is success.
  pub async fn cleanup_pid_file(&self) {
    if let Err(e) = self.store.remove(&self.store.pid_file()).await {
      warn!("Failed to remove PID file: {}", e);
    }
  }

  /// Delete the PID file only while it still names `pid`.
  ///
  /// Returns whether the file was ours. A file naming another service is left alone.
  pub async fn release_pid(&self, pid: u32) -> bool {
    match self.read_pid().await {
      Some(recorded) if recorded == pid => {
        self.cleanup_pid_file().await;
        true
      }
      recorded => {
        debug!(pid, recorded = ?recorded, "PID file not owned, leaving it");
        false
      }
    }
  }
}

//! Test helpers for multi-invocation lifecycle scenarios.
//!
//! Each call to [`LifecycleTestContext::invocation`] builds a fresh
//! controller over the same files, the way separate `ccr` processes would.

use std::{path::PathBuf, sync::Arc};

use tempfile::TempDir;

use crate::lifecycle::{FakeProcesses, LifecycleController, LifecycleStore};

pub struct LifecycleTestContext {
  /// Working directory holding the PID file
  pub project_dir: TempDir,
  /// Shared directory holding the reference counter
  pub shared_dir: TempDir,
  pub processes: FakeProcesses,
}

impl LifecycleTestContext {
  pub fn new() -> Self {
    Self {
      project_dir: TempDir::new().expect("create project temp dir"),
      shared_dir: TempDir::new().expect("create shared temp dir"),
      processes: FakeProcesses::new(),
    }
  }

  pub fn store(&self) -> LifecycleStore {
    LifecycleStore::new(self.project_dir.path(), self.shared_dir.path())
  }

  /// A controller as seen by one CLI invocation
  pub fn invocation(&self) -> LifecycleController {
    LifecycleController::new(self.store(), Arc::new(self.processes.clone()))
  }

  /// Simulate the service host coming up with `pid`
  pub async fn start_service(&self, pid: u32) {
    self.processes.spawn(pid);
    self
      .invocation()
      .registry()
      .write_pid(pid)
      .await
      .expect("write pid file");
  }

  pub fn pid_file(&self) -> PathBuf {
    self.project_dir.path().join(".ccr.pid")
  }

  pub fn count_on_disk(&self) -> Option<String> {
    std::fs::read_to_string(self.shared_dir.path().join("claude-code-reference-count.txt")).ok()
  }
}

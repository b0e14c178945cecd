//! Per-session override files read by the background service.
//!
//! The service is already running when a session starts, so it cannot take
//! per-session intent as arguments. Instead the session drops small JSON
//! files next to the PID file right before launching the foreground tool and
//! removes them once it exits.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::lifecycle::LifecycleStore;

/// `.model-override.json`: route this session to a specific provider/model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOverride {
  pub provider: String,
  pub model: String,
  /// Epoch milliseconds
  pub timestamp: i64,
}

/// `.strip-system.json`: drop the system prompt for this session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripSystem {
  pub enabled: bool,
  /// Epoch milliseconds
  pub timestamp: i64,
}

/// Tracks the signal files one session wrote so it removes exactly those.
#[derive(Debug)]
pub struct SessionSignals {
  store: LifecycleStore,
  written: Vec<PathBuf>,
}

impl SessionSignals {
  pub fn new(store: LifecycleStore) -> Self {
    Self {
      store,
      written: Vec::new(),
    }
  }

  /// Write the provider/model override. Returns false if the write failed.
  pub async fn write_model_override(&mut self, provider: &str, model: &str) -> bool {
    let signal = ModelOverride {
      provider: provider.to_string(),
      model: model.to_string(),
      timestamp: Utc::now().timestamp_millis(),
    };
    let path = self.store.model_override_file();
    self.write(path, &signal).await
  }

  /// Write the strip-system flag. Returns false if the write failed.
  pub async fn write_strip_system(&mut self) -> bool {
    let signal = StripSystem {
      enabled: true,
      timestamp: Utc::now().timestamp_millis(),
    };
    let path = self.store.strip_system_file();
    self.write(path, &signal).await
  }

  /// Files written so far
  pub fn written(&self) -> &[PathBuf] {
    &self.written
  }

  /// Remove every file this session wrote. Errors are logged and ignored.
  pub async fn clear(&mut self) {
    for path in self.written.drain(..) {
      match self.store.remove(&path).await {
        Ok(_) => debug!(path = ?path, "Removed signal file"),
        Err(e) => debug!(path = ?path, "Failed to remove signal file: {}", e),
      }
    }
  }

  async fn write<T: Serialize>(&mut self, path: PathBuf, signal: &T) -> bool {
    match self.store.write_json(&path, signal).await {
      Ok(()) => {
        debug!(path = ?path, "Wrote signal file");
        self.written.push(path);
        true
      }
      Err(e) => {
        warn!(path = ?path, "Could not write signal file: {}", e);
        false
      }
    }
  }
}

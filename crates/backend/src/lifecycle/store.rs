//! Filesystem-backed shared state.
//!
//! Every file that coordinates `ccr` processes (PID file, reference counter,
//! override signals) is read and written through [`LifecycleStore`]. Writes
//! go to a unique temp file in the target directory and are renamed over the
//! destination, so a concurrent reader sees either the old or the new value,
//! never a torn one.

use std::{
  io,
  path::{Path, PathBuf},
  sync::atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tracing::{debug, trace};

use crate::dirs;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Shared lifecycle files rooted at an injected project and shared directory.
#[derive(Debug, Clone)]
pub struct LifecycleStore {
  /// Holds the PID file and signal files (per working directory)
  project_dir: PathBuf,
  /// Holds the reference counter (visible from every working directory)
  shared_dir: PathBuf,
}

impl LifecycleStore {
  pub fn new(project_dir: impl Into<PathBuf>, shared_dir: impl Into<PathBuf>) -> Self {
    Self {
      project_dir: project_dir.into(),
      shared_dir: shared_dir.into(),
    }
  }

  /// Store rooted at the current directory and the system temp directory
  pub fn from_env() -> Self {
    Self::new(dirs::current_dir(), dirs::default_shared_dir())
  }

  pub fn project_dir(&self) -> &Path {
    &self.project_dir
  }

  pub fn shared_dir(&self) -> &Path {
    &self.shared_dir
  }

  pub fn pid_file(&self) -> PathBuf {
    self.project_dir.join(dirs::PID_FILE_NAME)
  }

  pub fn reference_count_file(&self) -> PathBuf {
    self.shared_dir.join(dirs::REFERENCE_COUNT_FILE_NAME)
  }

  pub fn model_override_file(&self) -> PathBuf {
    self.project_dir.join(dirs::MODEL_OVERRIDE_FILE_NAME)
  }

  pub fn strip_system_file(&self) -> PathBuf {
    self.project_dir.join(dirs::STRIP_SYSTEM_FILE_NAME)
  }

  /// Read a file as text. Any failure reads as absent.
  pub async fn read_string(&self, path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
      Ok(content) => Some(content),
      Err(e) => {
        trace!(path = ?path, error = %e, "Read treated as absent");
        None
      }
    }
  }

  /// Read a file holding a single non-negative integer.
  ///
  /// Missing, unreadable or non-numeric content reads as `None`.
  pub async fn read_u64(&self, path: &Path) -> Option<u64> {
    let content = self.read_string(path).await?;
    let value = content.trim().parse::<u64>().ok();
    if value.is_none() {
      debug!(path = ?path, content = %content.trim(), "Ignoring non-numeric content");
    }
    value
  }

  /// Replace `path` with `contents` via write-temp-then-rename.
  pub async fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let tmp = temp_path_for(path);
    if let Err(e) = tokio::fs::write(&tmp, contents).await {
      let _ = tokio::fs::remove_file(&tmp).await;
      return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
      let _ = tokio::fs::remove_file(&tmp).await;
      return Err(e);
    }

    trace!(path = ?path, bytes = contents.len(), "Wrote file");
    Ok(())
  }

  /// Atomically write an integer as text
  pub async fn write_u64(&self, path: &Path, value: u64) -> io::Result<()> {
    self.write_atomic(path, value.to_string().as_bytes()).await
  }

  /// Atomically write a JSON document
  pub async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec(value).map_err(io::Error::other)?;
    self.write_atomic(path, &json).await
  }

  /// Remove a file. Returns `Ok(false)` if it did not exist.
  pub async fn remove(&self, path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e),
    }
  }
}

/// Unique sibling temp path, so concurrent writers never share a temp file.
fn temp_path_for(path: &Path) -> PathBuf {
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "ccr".to_string());
  let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
  path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
}

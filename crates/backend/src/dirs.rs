//! Well-known locations shared by every `ccr` invocation.

use std::path::{Path, PathBuf};

/// Name of the project-local override directory (`./.claude-code-router/`).
pub const LOCAL_DIR_NAME: &str = ".claude-code-router";

/// Config file name looked up in every layer.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// PID file of the background service, relative to the project directory.
pub const PID_FILE_NAME: &str = ".ccr.pid";

/// Reference count file, relative to the shared directory.
pub const REFERENCE_COUNT_FILE_NAME: &str = "claude-code-reference-count.txt";

/// Per-session provider/model override read by the router.
pub const MODEL_OVERRIDE_FILE_NAME: &str = ".model-override.json";

/// Per-session strip-system flag read by the router.
pub const STRIP_SYSTEM_FILE_NAME: &str = ".strip-system.json";

/// Get the global home root for ccr
///
/// Respects the following environment variables (in order of precedence):
/// 1. CCR_HOME - explicit home root override
/// 2. dirs::home_dir() joined with `.claude-code-router`
pub fn default_home_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("CCR_HOME")
    && !dir.is_empty()
  {
    return PathBuf::from(dir);
  }

  user_home_dir().join(LOCAL_DIR_NAME)
}

/// The user's home directory, or `.` when it cannot be determined.
pub fn user_home_dir() -> PathBuf {
  dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Directory holding state that must be visible from every working directory.
///
/// The reference counter lives here so sessions started from different
/// projects still count against the same service.
pub fn default_shared_dir() -> PathBuf {
  std::env::temp_dir()
}

/// Current working directory, or `.` when it cannot be determined.
pub fn current_dir() -> PathBuf {
  std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Get the log directory under a home root
pub fn log_dir(home: &Path) -> PathBuf {
  home.join("logs")
}

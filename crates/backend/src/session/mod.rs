//! Foreground Claude Code sessions routed through the background service.

mod command;
mod platform;
mod runner;
mod signals;

pub use command::{ForegroundCommand, SettingsFlag, StatusLineSetting, router_env, shell_quote};
pub use platform::{HostEnv, Platform, default_mcp_config_path};
pub use runner::{
  INSTALL_HINT, PreparedSession, ProviderSelection, SessionError, SessionOutcome, SessionRequest, SessionRunner,
};
pub use signals::{ModelOverride, SessionSignals, StripSystem};

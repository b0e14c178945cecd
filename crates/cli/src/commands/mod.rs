//! CLI command implementations

mod code;
mod config;
mod service;
mod statusline;

pub use code::cmd_code;
pub use config::cmd_config;
pub use service::{cmd_start, cmd_status, cmd_stop};
pub use statusline::cmd_statusline;

mod domain;
pub use domain::config;

pub mod dirs;
pub mod host;
pub mod lifecycle;
pub mod session;

pub use host::{CurrentExeLauncher, ServiceHost};

//! Cross-process lifecycle of the shared background service.
//!
//! Independent `ccr` processes coordinate through two files only:
//!
//! - a PID file naming the running service ([`ServiceRegistry`])
//! - a reference count of dependent sessions ([`ReferenceCounter`])
//!
//! There are no locks. Every read treats missing or corrupt content as a
//! safe default and every write is an atomic replace ([`LifecycleStore`]),
//! so concurrent sessions converge rather than wedge.

mod controller;
mod process;
mod refcount;
mod registry;
mod store;

#[cfg(test)]
mod __tests__;

pub use controller::{LifecycleController, LifecycleError, ServiceLauncher, ServiceState, StartPolicy, StopOutcome};
pub use process::{ProcessControl, SystemProcesses};
pub use refcount::ReferenceCounter;
pub use registry::ServiceRegistry;
pub use store::LifecycleStore;

#[cfg(test)]
pub(crate) use process::fake::FakeProcesses;

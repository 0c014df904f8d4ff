//! Core functionality for launch
//!
//! `launch` runs one executable as a managed child, streams its output into
//! the log, and makes sure the child is killed whenever the supervisor stops,
//! whether that stop comes from an OS signal, the service manager, or the
//! child going away on its own.
//!
//! - [`config`]: launch configuration and validation
//! - [`logging`]: tracing subscriber setup (stderr plus optional JSON file)
//! - [`supervisor`]: starting and observing the child process
//! - [`shutdown`]: the shutdown coordinator and its close-once signals
//! - [`service`]: the service-manager control adapter

pub mod config;
pub mod error;
pub mod logging;
#[cfg(unix)]
pub mod process;
pub mod service;
pub mod shutdown;
pub mod supervisor;

#[cfg(test)]
mod error_tests;

pub use config::LaunchConfig;
pub use error::{CoreError, Result};

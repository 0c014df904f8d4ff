//! Shutdown coordination
//!
//! Three independent paths can ask the supervisor to stop: an OS termination
//! signal, a stop request from the service manager, and the child going away.
//! They all converge on one [`Coordinator`] run, which performs the graceful
//! shutdown exactly once.
//!
//! - [`ShutdownSignal`]: close-once notification shared between tasks
//! - [`ShutdownSignals`]: the three notifications of one run
//! - [`Coordinator`]: the `Running → ShuttingDown → Terminated` state machine
//! - [`OsSignals`]: SIGINT/SIGTERM listener (Unix)

pub mod coordinator;
#[cfg(unix)]
pub mod os_signal;
pub mod signal;

pub use coordinator::*;
#[cfg(unix)]
pub use os_signal::OsSignals;
pub use signal::{ShutdownSignal, ShutdownSignals};

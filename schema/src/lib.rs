//! Schema definitions for launch
//!
//! Plain data types shared by the supervisor core and the command-line
//! front end: process exit outcomes, service-manager lifecycle states and
//! control commands, and the shutdown state machine's vocabulary.
//! Everything here is serde-serializable so it can be emitted as structured
//! log fields.

pub mod process;
pub mod service;
pub mod shutdown;

pub use process::ExitOutcome;
pub use service::{AcceptedCommands, ControlCommand, ServiceState, ServiceStatus};
pub use shutdown::{CoordinatorState, OsSignal, ShutdownTrigger};

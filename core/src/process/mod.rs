//! OS-level process management for the supervised executable
//!
//! Only Unix is implemented: processes are spawned into their own process
//! group so the whole tree can be killed with one signal.

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::*;

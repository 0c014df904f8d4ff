//! Shutdown coordinator vocabulary

use crate::ExitOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the shutdown coordinator.
///
/// Transitions are one-way: `Running → ShuttingDown → Terminated`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorState {
    /// Supervising the child; no shutdown trigger seen yet
    Running,
    /// A trigger was accepted and the shutdown sequence is executing
    ShuttingDown,
    /// The shutdown sequence has completed
    Terminated,
}

/// OS signals the supervisor treats as termination requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OsSignal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for OsSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsSignal::Interrupt => f.write_str("SIGINT"),
            OsSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Which of the shutdown paths won the race into `ShuttingDown`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ShutdownTrigger {
    /// An OS termination signal was delivered
    OsSignal {
        /// The signal received
        signal: OsSignal,
    },
    /// Quit was requested by the service manager (or another in-process producer)
    QuitRequested,
    /// The child process ended on its own
    ChildExited {
        /// How it ended
        outcome: ExitOutcome,
    },
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::OsSignal { signal } => write!(f, "received {}", signal),
            ShutdownTrigger::QuitRequested => f.write_str("quit requested"),
            ShutdownTrigger::ChildExited { outcome } => write!(f, "child {}", outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_display() {
        let t = ShutdownTrigger::OsSignal {
            signal: OsSignal::Interrupt,
        };
        assert_eq!(t.to_string(), "received SIGINT");
        assert_eq!(ShutdownTrigger::QuitRequested.to_string(), "quit requested");
        let t = ShutdownTrigger::ChildExited {
            outcome: ExitOutcome::Failure { code: 1 },
        };
        assert_eq!(t.to_string(), "child exited with code 1");
    }
}

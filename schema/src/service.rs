//! Service-manager lifecycle types
//!
//! A service manager (systemd, or an in-process dispatcher) drives the
//! supervisor through control commands and expects lifecycle status reports
//! back. The states mirror what service managers conventionally track:
//!
//! ```text
//! StartPending → Running ⇄ Paused → StopPending → Stopped
//! ```
//!
//! `PausePending` and `ContinuePending` exist for managers that report the
//! transitional states; the adapter itself moves directly between `Running`
//! and `Paused`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state reported to the service manager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ServiceState {
    /// Service is starting up
    StartPending,
    /// Service is running
    Running,
    /// Pause has been requested but not completed
    PausePending,
    /// Service is paused
    Paused,
    /// Continue has been requested but not completed
    ContinuePending,
    /// Service is shutting down
    StopPending,
    /// Service has stopped
    Stopped,
}

impl ServiceState {
    /// Whether the state is a transitional one
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ServiceState::StartPending
                | ServiceState::PausePending
                | ServiceState::ContinuePending
                | ServiceState::StopPending
        )
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::StartPending => "start-pending",
            ServiceState::Running => "running",
            ServiceState::PausePending => "pause-pending",
            ServiceState::Paused => "paused",
            ServiceState::ContinuePending => "continue-pending",
            ServiceState::StopPending => "stop-pending",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Set of control commands the service currently accepts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedCommands {
    /// Accepts `Stop`
    pub stop: bool,
    /// Accepts system `Shutdown`
    pub shutdown: bool,
    /// Accepts `Pause` and `Continue`
    pub pause_continue: bool,
}

impl AcceptedCommands {
    /// Accepts nothing; used for pending and stopped states
    pub const NONE: AcceptedCommands = AcceptedCommands {
        stop: false,
        shutdown: false,
        pause_continue: false,
    };

    /// Stop, Shutdown, Pause and Continue
    pub const STANDARD: AcceptedCommands = AcceptedCommands {
        stop: true,
        shutdown: true,
        pause_continue: true,
    };

    /// Whether `command` is in the accepted set.
    ///
    /// `Interrogate` is always accepted; unknown codes never are.
    pub fn accepts(&self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::Interrogate => true,
            ControlCommand::Stop => self.stop,
            ControlCommand::Shutdown => self.shutdown,
            ControlCommand::Pause | ControlCommand::Continue => self.pause_continue,
            ControlCommand::Other(_) => false,
        }
    }
}

/// A status report sent to the service manager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Current lifecycle state
    pub state: ServiceState,
    /// Commands accepted in this state
    pub accepts: AcceptedCommands,
}

impl ServiceStatus {
    /// A status that accepts no commands
    pub const fn new(state: ServiceState) -> Self {
        Self {
            state,
            accepts: AcceptedCommands::NONE,
        }
    }

    /// A status with the given accepted command set
    pub const fn accepting(state: ServiceState, accepts: AcceptedCommands) -> Self {
        Self { state, accepts }
    }
}

/// A control command issued by the service manager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ControlCommand {
    /// Report the current status unchanged
    Interrogate,
    /// Stop the service
    Stop,
    /// The host is shutting down
    Shutdown,
    /// Pause the service
    Pause,
    /// Resume a paused service
    Continue,
    /// A raw command code the supervisor does not understand
    Other(u32),
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Interrogate => f.write_str("interrogate"),
            ControlCommand::Stop => f.write_str("stop"),
            ControlCommand::Shutdown => f.write_str("shutdown"),
            ControlCommand::Pause => f.write_str("pause"),
            ControlCommand::Continue => f.write_str("continue"),
            ControlCommand::Other(code) => write!(f, "#{}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_states() {
        assert!(ServiceState::StartPending.is_pending());
        assert!(ServiceState::StopPending.is_pending());
        assert!(!ServiceState::Running.is_pending());
        assert!(!ServiceState::Paused.is_pending());
        assert!(!ServiceState::Stopped.is_pending());
    }

    #[test]
    fn test_accepted_commands() {
        let standard = AcceptedCommands::STANDARD;
        assert!(standard.accepts(ControlCommand::Stop));
        assert!(standard.accepts(ControlCommand::Pause));
        assert!(!standard.accepts(ControlCommand::Other(200)));

        let none = AcceptedCommands::NONE;
        assert!(none.accepts(ControlCommand::Interrogate));
        assert!(!none.accepts(ControlCommand::Stop));
    }

    #[test]
    fn test_display() {
        assert_eq!(ServiceState::StopPending.to_string(), "stop-pending");
        assert_eq!(ControlCommand::Other(42).to_string(), "#42");
    }
}

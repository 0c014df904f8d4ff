//! Exit classification for the supervised process

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the supervised process ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ExitOutcome {
    /// Exited with status code 0
    Success,
    /// Exited with a non-zero status code
    Failure {
        /// Raw exit code reported by the OS
        code: i32,
    },
    /// Terminated by a signal before it could exit
    Signaled {
        /// Signal number that terminated the process
        signal: i32,
    },
}

impl ExitOutcome {
    /// Classify a raw `(code, signal)` pair as reported by the OS.
    ///
    /// A present exit code wins; a missing code with a signal is `Signaled`.
    /// The degenerate case of neither is reported as a failure with code -1.
    pub fn from_parts(code: Option<i32>, signal: Option<i32>) -> Self {
        match (code, signal) {
            (Some(0), _) => ExitOutcome::Success,
            (Some(code), _) => ExitOutcome::Failure { code },
            (None, Some(signal)) => ExitOutcome::Signaled { signal },
            (None, None) => ExitOutcome::Failure { code: -1 },
        }
    }

    /// Whether the process exited cleanly
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }

    /// Whether the process was killed by a signal
    pub fn is_signaled(&self) -> bool {
        matches!(self, ExitOutcome::Signaled { .. })
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Success => write!(f, "exited successfully"),
            ExitOutcome::Failure { code } => write!(f, "exited with code {}", code),
            ExitOutcome::Signaled { signal } => write!(f, "killed by signal {}", signal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        assert_eq!(ExitOutcome::from_parts(Some(0), None), ExitOutcome::Success);
        assert_eq!(
            ExitOutcome::from_parts(Some(3), None),
            ExitOutcome::Failure { code: 3 }
        );
        assert_eq!(
            ExitOutcome::from_parts(None, Some(9)),
            ExitOutcome::Signaled { signal: 9 }
        );
        assert_eq!(
            ExitOutcome::from_parts(None, None),
            ExitOutcome::Failure { code: -1 }
        );
    }

    #[test]
    fn test_predicates_and_display() {
        let killed = ExitOutcome::Signaled { signal: 9 };
        assert!(killed.is_signaled());
        assert!(!killed.is_success());
        assert_eq!(killed.to_string(), "killed by signal 9");
        assert_eq!(ExitOutcome::Success.to_string(), "exited successfully");
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&ExitOutcome::Failure { code: 2 }).unwrap();
        assert_eq!(json, r#"{"kind":"failure","code":2}"#);
    }
}

//! Deployment state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a supervised deployment.
///
/// States only advance forward. `Failed` can be entered from any
/// non-terminal state except `ShuttingDown`, so an orderly shutdown is never
/// reclassified as a failure. `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    NotStarted,
    Starting,
    Ready,
    Registering,
    Running,
    ShuttingDown,
    Stopped,
    Failed,
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid deployment transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: DeploymentState,
    pub to: DeploymentState,
}

impl DeploymentState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Check whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Stopped | Self::Failed, _) | (Self::ShuttingDown, Self::Failed) => false,
            (_, Self::Failed)
            | (Self::NotStarted, Self::Starting | Self::Stopped)
            | (Self::Starting, Self::Ready)
            | (Self::Ready, Self::Registering)
            | (Self::Registering, Self::Running)
            | (Self::ShuttingDown, Self::Stopped) => true,
            (Self::Starting | Self::Ready | Self::Registering | Self::Running, Self::ShuttingDown) => {
                true
            }
            _ => false,
        }
    }

    /// Validate a transition, returning the new state.
    pub const fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "NotStarted",
            Self::Starting => "Starting",
            Self::Ready => "Ready",
            Self::Registering => "Registering",
            Self::Running => "Running",
            Self::ShuttingDown => "ShuttingDown",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::DeploymentState::*;
    use super::*;

    const ALL: [DeploymentState; 8] = [
        NotStarted,
        Starting,
        Ready,
        Registering,
        Running,
        ShuttingDown,
        Stopped,
        Failed,
    ];

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            NotStarted,
            Starting,
            Ready,
            Registering,
            Running,
            ShuttingDown,
            Stopped,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for terminal in [Stopped, Failed] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(terminal.transition(next).is_err());
            }
        }
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_except_shutdown() {
        for state in [NotStarted, Starting, Ready, Registering, Running] {
            assert!(state.can_transition_to(Failed));
        }
        assert!(!ShuttingDown.can_transition_to(Failed));
    }

    #[test]
    fn test_no_regressions() {
        assert!(!Running.can_transition_to(Starting));
        assert!(!Ready.can_transition_to(Starting));
        assert!(!Registering.can_transition_to(Ready));
        assert!(!ShuttingDown.can_transition_to(Running));
        assert!(!Starting.can_transition_to(Starting));
    }

    #[test]
    fn test_transition_error_reports_both_ends() {
        let err = Running.transition(Starting).unwrap_err();
        assert_eq!(err.from, Running);
        assert_eq!(err.to, Starting);
        assert_eq!(err.to_string(), "Invalid deployment transition: Running -> Starting");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&ShuttingDown).unwrap();
        assert_eq!(json, "\"shutting_down\"");
    }
}

//! Instance-level and node-level status.

use serde::{Deserialize, Serialize};

/// The overall status of a process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Running; may be waiting on work items or events.
    Active,
    /// No active node instance remains.
    Completed,
    /// Aborted by an external request.
    Aborted,
    /// Halted by an unrecovered failure, awaiting operator recovery.
    Error,
    /// Paused by the host.
    Suspended,
}

impl ProcessState {
    /// Returns `true` if the instance has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns `true` if the instance accepts signals and completions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Error => write!(f, "error"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// The status of one node activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeInstanceState {
    /// Evaluating or waiting.
    Active,
    /// Left through its normal connections.
    Completed,
    /// Left through its abort connections, if any.
    Aborted,
}

impl NodeInstanceState {
    /// Returns `true` once the node instance has been left.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for NodeInstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

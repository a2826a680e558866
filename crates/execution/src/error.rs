//! Execution error types.

use std::fmt::Display;

use orrery_definition::VariableType;
use thiserror::Error;

use crate::scope::ScopeId;

/// Errors raised by execution state bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// A state transition is not valid for the current status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// A snapshot could not be turned back into runtime state.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl ExecutionError {
    /// Create an invalid-transition error from any pair of states.
    pub fn invalid_transition(from: impl Display, to: impl Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Variable resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    /// Strict mode rejected access to an undeclared name.
    #[error("undeclared variable `{0}`")]
    Undeclared(String),

    /// The value does not match the declared type.
    #[error("variable `{name}` expects {expected}, got {actual}")]
    TypeMismatch {
        /// Variable name.
        name: String,
        /// Declared type.
        expected: VariableType,
        /// JSON kind of the rejected value.
        actual: String,
    },

    /// The scope does not exist (closed or never opened).
    #[error("unknown scope {0}")]
    UnknownScope(ScopeId),
}

//! Work item error types.

use orrery_core::{TaskType, WorkItemId};
use thiserror::Error;

use crate::item::WorkItemState;

/// Invalid lifecycle operations on a [`WorkItem`](crate::WorkItem).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkItemError {
    /// The requested state change is not allowed from the current state.
    #[error("work item {id}: invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The work item.
        id: WorkItemId,
        /// Current state.
        from: WorkItemState,
        /// Attempted target state.
        to: WorkItemState,
    },
}

/// Handler lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No handler is registered for the task type.
    #[error("no handler registered for task type `{0}`")]
    HandlerNotFound(TaskType),
}

/// Errors returned to a handler calling back through a [`WorkItemManager`](crate::WorkItemManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// The work item is not known to the engine.
    #[error("unknown work item: {0}")]
    UnknownWorkItem(WorkItemId),

    /// The work item already reached a terminal state.
    #[error("work item {id} is already {state}")]
    AlreadyTerminal {
        /// The work item.
        id: WorkItemId,
        /// Its terminal state.
        state: WorkItemState,
    },

    /// The engine that issued the manager handle has been dropped.
    #[error("engine is no longer running")]
    EngineGone,

    /// The engine refused the callback.
    #[error("rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_not_found_display() {
        let err = RegistryError::HandlerNotFound(TaskType::new("Human Task").unwrap());
        assert_eq!(err.to_string(), "no handler registered for task type `Human Task`");
    }

    #[test]
    fn already_terminal_display() {
        let id = WorkItemId::nil();
        let err = ManagerError::AlreadyTerminal {
            id,
            state: WorkItemState::Completed,
        };
        assert_eq!(
            err.to_string(),
            "work item 00000000-0000-0000-0000-000000000000 is already completed"
        );
    }
}

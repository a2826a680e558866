//! Engine error types.

use orrery_core::{NodeKey, ProcessInstanceId, ProcessKey, WorkItemId};
use orrery_definition::DefinitionError;
use orrery_execution::{ExecutionError, ProcessState, VariableError};
use orrery_workitem::{ManagerError, WorkItemState};

use crate::timer::TimerError;

/// Operation-level rejections.
///
/// Failures that halt an instance (handler faults, missing handlers,
/// condition or variable errors mid-cascade) are not errors of the
/// operation: the instance moves to ERROR and the returned summary says so.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No definition is registered under the key.
    #[error("definition not found: {0}")]
    DefinitionNotFound(ProcessKey),

    /// The definition was rejected at registration.
    #[error("invalid definition: {0}")]
    Definition(#[from] DefinitionError),

    /// No instance with this id is loaded.
    #[error("instance not found: {0}")]
    InstanceNotFound(ProcessInstanceId),

    /// The instance is COMPLETED or ABORTED.
    #[error("instance {instance_id} is {state}")]
    InstanceTerminal {
        /// The instance.
        instance_id: ProcessInstanceId,
        /// Its terminal state.
        state: ProcessState,
    },

    /// The instance is in ERROR or SUSPENDED.
    #[error("instance {instance_id} is {state}, not active")]
    InstanceNotActive {
        /// The instance.
        instance_id: ProcessInstanceId,
        /// Its state.
        state: ProcessState,
    },

    /// The operation requires a terminal instance.
    #[error("instance {instance_id} is still {state}")]
    InstanceNotTerminal {
        /// The instance.
        instance_id: ProcessInstanceId,
        /// Its state.
        state: ProcessState,
    },

    /// No work item with this id is known.
    #[error("work item not found: {0}")]
    WorkItemNotFound(WorkItemId),

    /// The work item already completed or aborted.
    #[error("work item {work_item_id} is already {state}")]
    WorkItemTerminal {
        /// The work item.
        work_item_id: WorkItemId,
        /// Its state.
        state: WorkItemState,
    },

    /// The definition has no node with this key.
    #[error("node not found: {0}")]
    NodeNotFound(NodeKey),

    /// The node cannot be used as a recovery target.
    #[error("cannot resume from node {node}: {reason}")]
    ResumeTarget {
        /// The requested node.
        node: NodeKey,
        /// Why it was refused.
        reason: String,
    },

    /// Initial variables were rejected.
    #[error("variable error: {0}")]
    Variable(#[from] VariableError),

    /// The instance cannot move to the requested state.
    #[error("execution error: {0}")]
    InvalidTransition(#[from] ExecutionError),

    /// The timer service refused an operation.
    #[error("timer error: {0}")]
    Timer(#[from] TimerError),

    /// A snapshot could not be restored.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<EngineError> for ManagerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::WorkItemNotFound(id) => Self::UnknownWorkItem(id),
            EngineError::WorkItemTerminal {
                work_item_id,
                state,
            } => Self::AlreadyTerminal {
                id: work_item_id,
                state,
            },
            other => Self::Rejected(other.to_string()),
        }
    }
}

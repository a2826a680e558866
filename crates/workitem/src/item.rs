//! The work item record and its lifecycle.

use std::collections::BTreeMap;

use orrery_core::{NodeInstanceId, ProcessInstanceId, TaskType, WorkItemId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkItemError;

/// Parameter and result mappings exchanged with handlers.
pub type DataMap = BTreeMap<String, Value>;

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemState {
    /// Dispatched and awaiting an outcome.
    Active,
    /// Completed; results are set.
    Completed,
    /// Aborted by the handler, a strategy, or an instance abort.
    Aborted,
    /// Left in place after an unrecovered fault.
    Error,
}

impl WorkItemState {
    /// Returns `true` if no further outcome may be recorded.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns `true` if the transition from `self` to `to` is valid.
    ///
    /// An errored item may only be discarded (aborted) during operator recovery.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Active, Self::Completed)
                | (Self::Active, Self::Aborted)
                | (Self::Active, Self::Error)
                | (Self::Error, Self::Aborted)
        )
    }
}

impl std::fmt::Display for WorkItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single unit of work delegated to an external handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier.
    pub id: WorkItemId,
    /// Handler key.
    pub task_type: TaskType,
    /// Instance the work belongs to.
    pub process_instance: ProcessInstanceId,
    /// Node instance waiting on this item.
    pub node_instance: NodeInstanceId,
    /// Inputs resolved at dispatch time.
    pub parameters: DataMap,
    /// Outputs, populated only at the COMPLETED transition.
    #[serde(default)]
    pub results: DataMap,
    /// Current lifecycle state.
    pub state: WorkItemState,
    /// Number of times `execute` has been invoked.
    #[serde(default)]
    pub attempts: u32,
}

impl WorkItem {
    /// Create an active work item with a fresh id.
    #[must_use]
    pub fn new(
        task_type: TaskType,
        process_instance: ProcessInstanceId,
        node_instance: NodeInstanceId,
        parameters: DataMap,
    ) -> Self {
        Self {
            id: WorkItemId::v4(),
            task_type,
            process_instance,
            node_instance,
            parameters,
            results: DataMap::new(),
            state: WorkItemState::Active,
            attempts: 0,
        }
    }

    /// Look up a parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Move to COMPLETED and record the results.
    pub fn complete(&mut self, results: DataMap) -> Result<(), WorkItemError> {
        self.transition(WorkItemState::Completed)?;
        self.results = results;
        Ok(())
    }

    /// Move to ABORTED.
    pub fn abort(&mut self) -> Result<(), WorkItemError> {
        self.transition(WorkItemState::Aborted)
    }

    /// Move to ERROR after an unrecovered fault.
    pub fn fail(&mut self) -> Result<(), WorkItemError> {
        self.transition(WorkItemState::Error)
    }

    fn transition(&mut self, to: WorkItemState) -> Result<(), WorkItemError> {
        if !self.state.can_transition(to) {
            return Err(WorkItemError::InvalidTransition {
                id: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item() -> WorkItem {
        WorkItem::new(
            TaskType::new("Human Task").unwrap(),
            ProcessInstanceId::v4(),
            NodeInstanceId::v4(),
            DataMap::from([("approver".to_owned(), json!("mary"))]),
        )
    }

    #[test]
    fn starts_active_without_results() {
        let item = item();
        assert_eq!(item.state, WorkItemState::Active);
        assert!(item.results.is_empty());
        assert_eq!(item.parameter("approver"), Some(&json!("mary")));
    }

    #[test]
    fn results_are_set_once_on_completion() {
        let mut item = item();
        item.complete(DataMap::from([("ok".to_owned(), json!(true))]))
            .unwrap();
        assert_eq!(item.state, WorkItemState::Completed);
        assert_eq!(item.results.get("ok"), Some(&json!(true)));

        let err = item.complete(DataMap::new()).unwrap_err();
        assert!(matches!(err, WorkItemError::InvalidTransition { .. }));
        assert_eq!(item.results.get("ok"), Some(&json!(true)));
    }

    #[test]
    fn errored_item_can_only_be_discarded() {
        let mut item = item();
        item.fail().unwrap();
        assert!(item.complete(DataMap::new()).is_err());
        item.abort().unwrap();
        assert_eq!(item.state, WorkItemState::Aborted);
    }

    #[test]
    fn terminal_states() {
        assert!(WorkItemState::Completed.is_terminal());
        assert!(WorkItemState::Aborted.is_terminal());
        assert!(!WorkItemState::Error.is_terminal());
        assert!(!WorkItemState::Active.is_terminal());
    }
}

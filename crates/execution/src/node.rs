//! Runtime activation records of node definitions.

use orrery_core::{NodeInstanceId, NodeKey, WorkItemId};
use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationKey;
use crate::error::ExecutionError;
use crate::scope::ScopeId;
use crate::snapshot::NodeInstanceSnapshot;
use crate::status::NodeInstanceState;
use crate::transition::validate_node_transition;

/// What an active node instance is waiting for. Exactly one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeWait {
    /// Being evaluated synchronously by the current cascade.
    Evaluating,
    /// An outstanding work item.
    WorkItem {
        /// The work item.
        id: WorkItemId,
    },
    /// An outstanding signal, message, or timer.
    Correlation {
        /// The registered key.
        key: CorrelationKey,
    },
    /// Inner node instances of a sub-process.
    Children,
}

/// One activation of a node definition within an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInstance {
    /// Unique within the instance.
    pub id: NodeInstanceId,
    /// The node definition.
    pub node: NodeKey,
    /// Current state.
    pub state: NodeInstanceState,
    /// Enclosing sub-process instance, `None` at top level.
    pub container: Option<NodeInstanceId>,
    /// Scope variables are resolved from. A sub-process points at its own child scope.
    pub scope: ScopeId,
    /// Outstanding wait.
    pub wait: NodeWait,
}

impl NodeInstance {
    /// Create an active node instance that is being evaluated.
    #[must_use]
    pub fn new(node: NodeKey, container: Option<NodeInstanceId>, scope: ScopeId) -> Self {
        Self {
            id: NodeInstanceId::v4(),
            node,
            state: NodeInstanceState::Active,
            container,
            scope,
            wait: NodeWait::Evaluating,
        }
    }

    /// The outstanding work item, if any.
    #[must_use]
    pub fn work_item(&self) -> Option<WorkItemId> {
        match self.wait {
            NodeWait::WorkItem { id } => Some(id),
            _ => None,
        }
    }

    /// The outstanding correlation key, if any.
    #[must_use]
    pub fn correlation(&self) -> Option<&CorrelationKey> {
        match &self.wait {
            NodeWait::Correlation { key } => Some(key),
            _ => None,
        }
    }

    /// Leave through the normal connections.
    pub fn complete(&mut self) -> Result<(), ExecutionError> {
        self.leave(NodeInstanceState::Completed)
    }

    /// Leave through the abort connections.
    pub fn abort(&mut self) -> Result<(), ExecutionError> {
        self.leave(NodeInstanceState::Aborted)
    }

    fn leave(&mut self, to: NodeInstanceState) -> Result<(), ExecutionError> {
        validate_node_transition(self.state, to)?;
        self.state = to;
        self.wait = NodeWait::Evaluating;
        Ok(())
    }

    /// Flatten into the persistence contract.
    #[must_use]
    pub fn to_snapshot(&self) -> NodeInstanceSnapshot {
        NodeInstanceSnapshot {
            id: self.id,
            node: self.node.clone(),
            state: self.state,
            container: self.container,
            scope: self.scope,
            work_item: self.work_item(),
            correlation: self.correlation().cloned(),
            awaiting_children: matches!(self.wait, NodeWait::Children),
        }
    }

    /// Rebuild from the persistence contract.
    pub fn from_snapshot(snapshot: NodeInstanceSnapshot) -> Result<Self, ExecutionError> {
        let wait = match (
            snapshot.work_item,
            snapshot.correlation,
            snapshot.awaiting_children,
        ) {
            (None, None, false) => NodeWait::Evaluating,
            (Some(id), None, false) => NodeWait::WorkItem { id },
            (None, Some(key), false) => NodeWait::Correlation { key },
            (None, None, true) => NodeWait::Children,
            _ => {
                return Err(ExecutionError::InvalidSnapshot(format!(
                    "node instance {} waits on more than one thing",
                    snapshot.id
                )));
            }
        };
        Ok(Self {
            id: snapshot.id,
            node: snapshot.node,
            state: snapshot.state,
            container: snapshot.container,
            scope: snapshot.scope,
            wait,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn instance() -> NodeInstance {
        NodeInstance::new(NodeKey::new("task").unwrap(), None, ScopeId::ROOT)
    }

    #[test]
    fn single_outstanding_wait() {
        let mut ni = instance();
        let id = WorkItemId::v4();
        ni.wait = NodeWait::WorkItem { id };
        assert_eq!(ni.work_item(), Some(id));
        assert_eq!(ni.correlation(), None);

        ni.wait = NodeWait::Correlation {
            key: CorrelationKey::signal("go"),
        };
        assert_eq!(ni.work_item(), None);
        assert!(ni.correlation().is_some());
    }

    #[test]
    fn leaves_once() {
        let mut ni = instance();
        ni.complete().unwrap();
        assert_eq!(ni.state, NodeInstanceState::Completed);
        assert!(ni.abort().is_err());
    }

    #[test]
    fn snapshot_restores_wait() {
        let mut ni = instance();
        ni.wait = NodeWait::Correlation {
            key: CorrelationKey::correlated("order", "A-1"),
        };
        let back = NodeInstance::from_snapshot(ni.to_snapshot()).unwrap();
        assert_eq!(back, ni);
    }

    #[test]
    fn snapshot_with_two_waits_is_rejected() {
        let mut snapshot = instance().to_snapshot();
        snapshot.work_item = Some(WorkItemId::v4());
        snapshot.correlation = Some(CorrelationKey::signal("go"));
        assert!(matches!(
            NodeInstance::from_snapshot(snapshot),
            Err(ExecutionError::InvalidSnapshot(_))
        ));
    }
}

//! Persistence contract and read-only views of an instance.

use chrono::{DateTime, Utc};
use orrery_core::{NodeInstanceId, NodeKey, ProcessInstanceId, ProcessKey, WorkItemId};
use orrery_workitem::{DataMap, WorkItem};
use serde::{Deserialize, Serialize};

use crate::agenda::AgendaItem;
use crate::correlation::CorrelationKey;
use crate::journal::Journal;
use crate::scope::{ScopeId, ScopeTree};
use crate::status::{NodeInstanceState, ProcessState};

/// Why an instance entered ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A handler fault resolved to RETHROW.
    HandlerFault,
    /// A RETRY fault ran out of attempts.
    RetryExhausted,
    /// No handler was registered for the task type.
    Configuration,
    /// A variable write failed during the cascade.
    VariableResolution,
    /// No gateway connection could be taken, or a condition failed to evaluate.
    Condition,
    /// A transformation failed to apply.
    Transformation,
    /// The timer service refused to schedule.
    Timer,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HandlerFault => write!(f, "handler_fault"),
            Self::RetryExhausted => write!(f, "retry_exhausted"),
            Self::Configuration => write!(f, "configuration"),
            Self::VariableResolution => write!(f, "variable_resolution"),
            Self::Condition => write!(f, "condition"),
            Self::Transformation => write!(f, "transformation"),
            Self::Timer => write!(f, "timer"),
        }
    }
}

/// Context retained while an instance is in ERROR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Failing node definition.
    pub node: Option<NodeKey>,
    /// Failing node instance, kept active for recovery.
    pub node_instance: Option<NodeInstanceId>,
    /// Work item left in ERROR, if the failure came from a handler.
    pub work_item: Option<WorkItemId>,
    /// Failure category.
    pub kind: ErrorKind,
    /// Cause.
    pub message: String,
    /// When the failure happened.
    pub occurred_at: DateTime<Utc>,
}

impl ErrorContext {
    /// Create a context not tied to any node.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            node: None,
            node_instance: None,
            work_item: None,
            kind,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Attach the failing node.
    #[must_use]
    pub fn at_node(mut self, node: NodeKey, node_instance: NodeInstanceId) -> Self {
        self.node = Some(node);
        self.node_instance = Some(node_instance);
        self
    }

    /// Attach the failing work item.
    #[must_use]
    pub fn with_work_item(mut self, work_item: WorkItemId) -> Self {
        self.work_item = Some(work_item);
        self
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{} at node `{node}`: {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Persisted form of one active node instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInstanceSnapshot {
    /// Node instance id.
    pub id: NodeInstanceId,
    /// Node definition key.
    pub node: NodeKey,
    /// State.
    pub state: NodeInstanceState,
    /// Enclosing sub-process instance.
    #[serde(default)]
    pub container: Option<NodeInstanceId>,
    /// Scope variables resolve from.
    pub scope: ScopeId,
    /// Outstanding work item.
    #[serde(default)]
    pub work_item: Option<WorkItemId>,
    /// Outstanding correlation key.
    #[serde(default)]
    pub correlation: Option<CorrelationKey>,
    /// Sub-process waiting on its inner node instances.
    #[serde(default)]
    pub awaiting_children: bool,
}

/// Arrivals counted at a converging parallel gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSnapshot {
    /// Sub-process instance the gateway sits in, `None` at top level.
    pub container: Option<NodeInstanceId>,
    /// The gateway.
    pub gateway: NodeKey,
    /// Arrivals so far.
    pub arrivals: usize,
}

/// Everything needed to rebuild an instance without replaying history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    /// Instance id.
    pub instance_id: ProcessInstanceId,
    /// Definition the instance runs.
    pub definition_id: ProcessKey,
    /// Definition revision at start.
    pub definition_version: u32,
    /// Current state.
    pub state: ProcessState,
    /// Failure context while in ERROR.
    #[serde(default)]
    pub error: Option<ErrorContext>,
    /// Active node instances.
    pub active_node_instances: Vec<NodeInstanceSnapshot>,
    /// Root scope values.
    pub variables: DataMap,
    /// Every open scope, root included.
    pub scopes: ScopeTree,
    /// Work items of the instance, terminal ones included.
    #[serde(default)]
    pub work_items: Vec<WorkItem>,
    /// Pending parallel joins.
    #[serde(default)]
    pub joins: Vec<JoinSnapshot>,
    /// Cascade steps left over by a failure.
    #[serde(default)]
    pub deferred: Vec<AgendaItem>,
    /// Journal at the time of the snapshot.
    #[serde(default)]
    pub journal: Journal,
}

impl InstanceSnapshot {
    /// Serialize this snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// What an operation reports about the instance it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    /// Instance id.
    pub id: ProcessInstanceId,
    /// Definition the instance runs.
    pub process: ProcessKey,
    /// State after the operation settled.
    pub state: ProcessState,
    /// Node keys of the active node instances, sorted.
    pub active_nodes: Vec<NodeKey>,
    /// Failure context while in ERROR.
    pub error: Option<ErrorContext>,
}

impl InstanceSummary {
    /// Returns `true` if the instance has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_core::TaskType;
    use serde_json::json;

    #[test]
    fn error_context_display() {
        let ctx = ErrorContext::new(ErrorKind::HandlerFault, "boom")
            .at_node(NodeKey::new("task").unwrap(), NodeInstanceId::v4());
        assert_eq!(ctx.to_string(), "handler_fault at node `task`: boom");
        assert_eq!(
            ErrorContext::new(ErrorKind::Condition, "no route").to_string(),
            "condition: no route"
        );
    }

    #[test]
    fn snapshot_survives_json() {
        let instance_id = ProcessInstanceId::v4();
        let mut scopes = ScopeTree::new(false, &[]);
        scopes.set(ScopeId::ROOT, "isChecked", json!("false")).unwrap();
        let node_instance = NodeInstanceId::v4();
        let item = WorkItem::new(
            TaskType::new("Human Task").unwrap(),
            instance_id,
            node_instance,
            DataMap::new(),
        );

        let snapshot = InstanceSnapshot {
            instance_id,
            definition_id: ProcessKey::new("orders").unwrap(),
            definition_version: 1,
            state: ProcessState::Active,
            error: None,
            active_node_instances: vec![NodeInstanceSnapshot {
                id: node_instance,
                node: NodeKey::new("task").unwrap(),
                state: NodeInstanceState::Active,
                container: None,
                scope: ScopeId::ROOT,
                work_item: Some(item.id),
                correlation: None,
                awaiting_children: false,
            }],
            variables: scopes.root_values(),
            scopes,
            work_items: vec![item],
            joins: vec![],
            deferred: vec![],
            journal: Journal::new(8),
        };

        let back = InstanceSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.variables.get("isChecked"), Some(&json!("false")));
    }
}

//! In-memory state of one process instance.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use orrery_core::{NodeInstanceId, NodeKey, ProcessInstanceId, WorkItemId};
use orrery_execution::{
    AgendaItem, ErrorContext, ExecutionError, InstanceSnapshot, InstanceSummary, JoinSnapshot,
    Journal, JournalEntry, NodeInstance, NodeWait, ProcessState, ScopeId, ScopeTree,
    transition::validate_process_transition,
};
use orrery_workitem::{HandlerRegistry, WorkItem, WorkItemHandler};

use crate::registered::RegisteredDefinition;

/// A work item and the handler pinned to it at dispatch.
pub(crate) struct WorkItemEntry {
    pub(crate) item: WorkItem,
    pub(crate) handler: Option<Arc<dyn WorkItemHandler>>,
}

/// Mutable state of one instance. Only touched under the instance lock.
pub(crate) struct ProcessInstance {
    pub(crate) id: ProcessInstanceId,
    pub(crate) definition: Arc<RegisteredDefinition>,
    pub(crate) state: ProcessState,
    pub(crate) scopes: ScopeTree,
    pub(crate) nodes: BTreeMap<NodeInstanceId, NodeInstance>,
    pub(crate) work_items: HashMap<WorkItemId, WorkItemEntry>,
    pub(crate) joins: HashMap<(Option<NodeInstanceId>, NodeKey), usize>,
    pub(crate) error: Option<ErrorContext>,
    pub(crate) journal: Journal,
    pub(crate) deferred: Vec<AgendaItem>,
}

impl ProcessInstance {
    pub(crate) fn new(
        definition: Arc<RegisteredDefinition>,
        strict: bool,
        journal_capacity: usize,
    ) -> Self {
        let scopes = ScopeTree::new(strict, &definition.definition().variables);
        Self {
            id: ProcessInstanceId::v4(),
            definition,
            state: ProcessState::Active,
            scopes,
            nodes: BTreeMap::new(),
            work_items: HashMap::new(),
            joins: HashMap::new(),
            error: None,
            journal: Journal::new(journal_capacity),
            deferred: Vec::new(),
        }
    }

    /// Move to `to`, journaling the change.
    pub(crate) fn transition(&mut self, to: ProcessState) -> Result<(), ExecutionError> {
        validate_process_transition(self.state, to)?;
        let from = self.state;
        self.state = to;
        self.journal.push(JournalEntry::StateChanged {
            timestamp: Utc::now(),
            from,
            to,
        });
        Ok(())
    }

    /// Scope that nodes inside `container` resolve variables from.
    pub(crate) fn container_scope(&self, container: Option<NodeInstanceId>) -> ScopeId {
        container
            .and_then(|c| self.nodes.get(&c))
            .map_or(ScopeId::ROOT, |n| n.scope)
    }

    /// Active node instances directly inside `container`.
    pub(crate) fn children_of(&self, container: Option<NodeInstanceId>) -> Vec<NodeInstanceId> {
        self.nodes
            .values()
            .filter(|n| n.container == container)
            .map(|n| n.id)
            .collect()
    }

    /// `root` and everything nested inside it, innermost first.
    pub(crate) fn subtree(&self, root: NodeInstanceId) -> Vec<NodeInstanceId> {
        let mut order = vec![root];
        let mut cursor = 0;
        while cursor < order.len() {
            let children = self.children_of(Some(order[cursor]));
            order.extend(children);
            cursor += 1;
        }
        order.reverse();
        order
    }

    pub(crate) fn summary(&self) -> InstanceSummary {
        let mut active_nodes: Vec<NodeKey> = self.nodes.values().map(|n| n.node.clone()).collect();
        active_nodes.sort();
        InstanceSummary {
            id: self.id,
            process: self.definition.definition().id.clone(),
            state: self.state,
            active_nodes,
            error: self.error.clone(),
        }
    }

    pub(crate) fn snapshot(&self) -> InstanceSnapshot {
        let mut work_items: Vec<WorkItem> =
            self.work_items.values().map(|e| e.item.clone()).collect();
        work_items.sort_by_key(|w| w.id);
        let mut joins: Vec<JoinSnapshot> = self
            .joins
            .iter()
            .map(|((container, gateway), arrivals)| JoinSnapshot {
                container: *container,
                gateway: gateway.clone(),
                arrivals: *arrivals,
            })
            .collect();
        joins.sort_by(|a, b| (a.container, &a.gateway).cmp(&(b.container, &b.gateway)));

        InstanceSnapshot {
            instance_id: self.id,
            definition_id: self.definition.definition().id.clone(),
            definition_version: self.definition.definition().version,
            state: self.state,
            error: self.error.clone(),
            active_node_instances: self.nodes.values().map(NodeInstance::to_snapshot).collect(),
            variables: self.scopes.root_values(),
            scopes: self.scopes.clone(),
            work_items,
            joins,
            deferred: self.deferred.clone(),
            journal: self.journal.clone(),
        }
    }

    /// Rebuild from a snapshot. Work items are bound to the handlers
    /// currently registered for their task types.
    pub(crate) fn from_snapshot(
        snapshot: InstanceSnapshot,
        definition: Arc<RegisteredDefinition>,
        handlers: &HandlerRegistry,
    ) -> Result<Self, ExecutionError> {
        let mut nodes = BTreeMap::new();
        for node in snapshot.active_node_instances {
            if definition.node(node.node.as_str()).is_none() {
                return Err(ExecutionError::InvalidSnapshot(format!(
                    "node `{}` is not part of the definition",
                    node.node
                )));
            }
            let node = NodeInstance::from_snapshot(node)?;
            if !snapshot.scopes.contains(node.scope) {
                return Err(ExecutionError::InvalidSnapshot(format!(
                    "node instance {} refers to a closed scope",
                    node.id
                )));
            }
            nodes.insert(node.id, node);
        }
        for node in nodes.values() {
            if let NodeWait::WorkItem { id } = node.wait
                && !snapshot.work_items.iter().any(|w| w.id == id)
            {
                return Err(ExecutionError::InvalidSnapshot(format!(
                    "work item {id} of node instance {} is missing",
                    node.id
                )));
            }
        }

        let work_items = snapshot
            .work_items
            .into_iter()
            .map(|item| {
                let handler = handlers.get(&item.task_type).ok();
                (item.id, WorkItemEntry { item, handler })
            })
            .collect();
        let joins = snapshot
            .joins
            .into_iter()
            .map(|j| ((j.container, j.gateway), j.arrivals))
            .collect();

        Ok(Self {
            id: snapshot.instance_id,
            definition,
            state: snapshot.state,
            scopes: snapshot.scopes,
            nodes,
            work_items,
            joins,
            error: snapshot.error,
            journal: snapshot.journal,
            deferred: snapshot.deferred,
        })
    }
}

//! Process-level definition type.

use std::collections::{BTreeMap, BTreeSet};

use orrery_core::{NodeKey, ProcessKey, TaskType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::Connection;
use crate::import::ImportTable;
use crate::node::{NodeDefinition, NodeKind, ParameterSource, Transformation};
use crate::variable::VariableDeclaration;

/// A complete process definition: nodes, connections, variables, and imports.
///
/// Definitions are produced by an external compiler (or by
/// [`ProcessDefinitionBuilder`](crate::ProcessDefinitionBuilder)) and are
/// never mutated once registered with an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// Key instances are started by.
    pub id: ProcessKey,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Definition revision, informational only.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Nodes in declaration order.
    pub nodes: Vec<NodeDefinition>,
    /// Edges connecting the nodes.
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Variables declared on the root scope.
    #[serde(default)]
    pub variables: Vec<VariableDeclaration>,
    /// Imports available to transformations.
    #[serde(default)]
    pub imports: ImportTable,
    /// Free-form extension data. Never read by the engine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

fn default_version() -> u32 {
    1
}

impl ProcessDefinition {
    /// Create an empty definition.
    #[must_use]
    pub fn new(id: ProcessKey) -> Self {
        Self {
            name: id.to_string(),
            id,
            version: default_version(),
            nodes: Vec::new(),
            connections: Vec::new(),
            variables: Vec::new(),
            imports: ImportTable::default(),
            metadata: BTreeMap::new(),
        }
    }

    /// Look up a node by key.
    #[must_use]
    pub fn node(&self, key: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// Nodes whose container is `container` (`None` for top level).
    pub fn nodes_in<'a>(
        &'a self,
        container: Option<&'a NodeKey>,
    ) -> impl Iterator<Item = &'a NodeDefinition> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.container.as_ref() == container)
    }

    /// Start nodes of the given container.
    pub fn start_nodes<'a>(
        &'a self,
        container: Option<&'a NodeKey>,
    ) -> impl Iterator<Item = &'a NodeDefinition> + 'a {
        self.nodes_in(container).filter(|n| n.is_start())
    }

    /// Declared root-scope variable by name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&VariableDeclaration> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Every transformation in the definition together with the node that owns it.
    #[must_use]
    pub fn transformations(&self) -> Vec<(&NodeKey, &Transformation)> {
        let mut found = Vec::new();
        for node in &self.nodes {
            match &node.kind {
                NodeKind::Task(task) => {
                    for source in task.parameters.values() {
                        if let ParameterSource::Transformation(t) = source {
                            found.push((&node.key, t));
                        }
                    }
                }
                NodeKind::EventWait(event) => {
                    if let Some(t) = &event.transformation {
                        found.push((&node.key, t));
                    }
                }
                _ => {}
            }
        }
        found
    }

    /// Distinct task types referenced by task nodes.
    #[must_use]
    pub fn task_types(&self) -> BTreeSet<&TaskType> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Task(task) => Some(&task.task_type),
                _ => None,
            })
            .collect()
    }
}

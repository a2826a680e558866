//! Comprehensive definition validation that collects all errors.

use std::collections::{HashMap, HashSet};

use orrery_core::NodeKey;

use crate::connection::FlowPath;
use crate::definition::ProcessDefinition;
use crate::error::DefinitionError;
use crate::node::{NodeDefinition, NodeKind};
use crate::variable::VariableDeclaration;

/// Validate a process definition comprehensively.
///
/// Unlike [`ProcessDefinitionBuilder::build`](crate::ProcessDefinitionBuilder::build),
/// which stops at the first error, this function collects every issue it can
/// find so they can all be reported at once.
#[must_use]
pub fn validate_definition(definition: &ProcessDefinition) -> Vec<DefinitionError> {
    let mut errors = Vec::new();

    if definition.nodes.is_empty() {
        errors.push(DefinitionError::NoNodes);
        return errors;
    }

    let mut nodes: HashMap<&NodeKey, &NodeDefinition> = HashMap::new();
    for node in &definition.nodes {
        if nodes.insert(&node.key, node).is_some() {
            errors.push(DefinitionError::DuplicateNode(node.key.clone()));
        }
    }

    check_containers(&nodes, definition, &mut errors);
    check_connections(&nodes, definition, &mut errors);

    if definition.start_nodes(None).next().is_none() {
        errors.push(DefinitionError::NoStartNode);
    }
    for node in &definition.nodes {
        if let NodeKind::SubProcess(sub) = &node.kind {
            if definition.start_nodes(Some(&node.key)).next().is_none() {
                errors.push(DefinitionError::SubProcessWithoutStart(node.key.clone()));
            }
            check_variables(&sub.variables, &mut errors);
        }
    }

    check_variables(&definition.variables, &mut errors);

    errors
}

fn check_containers(
    nodes: &HashMap<&NodeKey, &NodeDefinition>,
    definition: &ProcessDefinition,
    errors: &mut Vec<DefinitionError>,
) {
    for node in &definition.nodes {
        let Some(container) = &node.container else {
            continue;
        };
        match nodes.get(container) {
            None => errors.push(DefinitionError::UnknownNode(container.clone())),
            Some(parent) if !matches!(parent.kind, NodeKind::SubProcess(_)) => {
                errors.push(DefinitionError::ContainerNotSubProcess {
                    node: node.key.clone(),
                    container: container.clone(),
                });
            }
            Some(_) => {}
        }
    }

    // Walk each sub-process's container chain; revisiting a key means a cycle.
    for node in &definition.nodes {
        if !matches!(node.kind, NodeKind::SubProcess(_)) {
            continue;
        }
        let mut seen = HashSet::new();
        let mut cursor = Some(&node.key);
        while let Some(current) = cursor {
            if !seen.insert(current) {
                errors.push(DefinitionError::ContainerCycle(node.key.clone()));
                break;
            }
            cursor = nodes.get(current).and_then(|n| n.container.as_ref());
        }
    }
}

fn check_connections(
    nodes: &HashMap<&NodeKey, &NodeDefinition>,
    definition: &ProcessDefinition,
    errors: &mut Vec<DefinitionError>,
) {
    let mut defaults: HashMap<&NodeKey, usize> = HashMap::new();
    let mut outgoing: HashSet<&NodeKey> = HashSet::new();

    for conn in &definition.connections {
        let from = nodes.get(&conn.from);
        let to = nodes.get(&conn.to);
        if from.is_none() {
            errors.push(DefinitionError::UnknownNode(conn.from.clone()));
        }
        if to.is_none() {
            errors.push(DefinitionError::UnknownNode(conn.to.clone()));
        }
        if conn.is_self_loop() {
            errors.push(DefinitionError::SelfLoop(conn.from.clone()));
        }
        let (Some(from), Some(to)) = (from, to) else {
            continue;
        };

        if from.container != to.container {
            errors.push(DefinitionError::CrossesContainer {
                from: conn.from.clone(),
                to: conn.to.clone(),
            });
        }
        if to.is_start() {
            errors.push(DefinitionError::StartHasIncoming(conn.to.clone()));
        }
        if conn.path == FlowPath::Normal && matches!(from.kind, NodeKind::End { .. }) {
            errors.push(DefinitionError::EndHasOutgoing(conn.from.clone()));
        }
        if conn.is_default {
            *defaults.entry(&conn.from).or_default() += 1;
        }
        outgoing.insert(&conn.from);
    }

    for node in &definition.nodes {
        if matches!(node.kind, NodeKind::Gateway(_)) && !outgoing.contains(&node.key) {
            errors.push(DefinitionError::GatewayWithoutOutgoing(node.key.clone()));
        }
    }
    for (key, count) in defaults {
        if count > 1 {
            errors.push(DefinitionError::MultipleDefaults(key.clone()));
        }
    }
}

fn check_variables(declarations: &[VariableDeclaration], errors: &mut Vec<DefinitionError>) {
    let mut seen = HashSet::new();
    for decl in declarations {
        if !seen.insert(decl.name.as_str()) {
            errors.push(DefinitionError::DuplicateVariable(decl.name.clone()));
        }
        if let Some(default) = &decl.default
            && !decl.var_type.accepts(default)
        {
            errors.push(DefinitionError::DefaultTypeMismatch {
                name: decl.name.clone(),
                expected: decl.var_type,
            });
        }
    }
}

//! Definition-time error types.

use orrery_core::{KeyError, NodeKey};
use thiserror::Error;

use crate::variable::VariableType;

/// Errors detected while building, validating, or registering a process definition.
///
/// Every variant is fatal for the definition: it is rejected before any
/// instance can start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    /// A key supplied to the builder failed validation.
    #[error("invalid key `{value}`: {source}")]
    InvalidKey {
        /// The raw input.
        value: String,
        /// Why it was rejected.
        source: KeyError,
    },

    /// The definition has no nodes.
    #[error("process definition must have at least one node")]
    NoNodes,

    /// Two nodes share a key.
    #[error("duplicate node key: {0}")]
    DuplicateNode(NodeKey),

    /// A connection or container reference points at a node that does not exist.
    #[error("reference to unknown node: {0}")]
    UnknownNode(NodeKey),

    /// A connection has the same source and target node.
    #[error("self-loop detected on node: {0}")]
    SelfLoop(NodeKey),

    /// A connection joins nodes that live in different containers.
    #[error("connection {from} -> {to} crosses a sub-process boundary")]
    CrossesContainer {
        /// Source node.
        from: NodeKey,
        /// Target node.
        to: NodeKey,
    },

    /// A node names a container that is not a sub-process node.
    #[error("node {node} is contained by {container}, which is not a sub-process")]
    ContainerNotSubProcess {
        /// The contained node.
        node: NodeKey,
        /// The offending container.
        container: NodeKey,
    },

    /// Container references form a cycle.
    #[error("sub-process {0} is nested inside itself")]
    ContainerCycle(NodeKey),

    /// No top-level start node.
    #[error("process definition has no top-level start node")]
    NoStartNode,

    /// A sub-process has no inner start node.
    #[error("sub-process {0} has no start node")]
    SubProcessWithoutStart(NodeKey),

    /// A start node is the target of a connection.
    #[error("start node {0} must not have incoming connections")]
    StartHasIncoming(NodeKey),

    /// An end node has outgoing normal connections.
    #[error("end node {0} must not have outgoing connections")]
    EndHasOutgoing(NodeKey),

    /// A gateway has nowhere to route to.
    #[error("gateway {0} has no outgoing connections")]
    GatewayWithoutOutgoing(NodeKey),

    /// More than one default connection leaves a gateway.
    #[error("gateway {0} declares more than one default connection")]
    MultipleDefaults(NodeKey),

    /// Two variable declarations share a name in the same scope.
    #[error("duplicate variable declaration: {0}")]
    DuplicateVariable(String),

    /// A variable default does not match its declared type.
    #[error("default for variable {name} is not a valid {expected}")]
    DefaultTypeMismatch {
        /// Variable name.
        name: String,
        /// Declared type.
        expected: VariableType,
    },

    /// A transformation could not be compiled.
    #[error("node {node}: transformation failed to compile: {reason}")]
    Transformation {
        /// The node carrying the transformation.
        node: NodeKey,
        /// Compiler message.
        reason: String,
    },

    /// Several issues found at once.
    #[error("{} definition errors, first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Multiple(Vec<DefinitionError>),
}

impl DefinitionError {
    /// Collapse a list of issues into a single error.
    ///
    /// Returns `None` for an empty list and the error itself for a singleton.
    #[must_use]
    pub fn from_issues(mut issues: Vec<Self>) -> Option<Self> {
        match issues.len() {
            0 => None,
            1 => issues.pop(),
            _ => Some(Self::Multiple(issues)),
        }
    }

    /// Flatten into the list of individual issues.
    #[must_use]
    pub fn issues(&self) -> Vec<&Self> {
        match self {
            Self::Multiple(inner) => inner.iter().collect(),
            other => vec![other],
        }
    }
}

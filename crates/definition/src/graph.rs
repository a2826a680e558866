//! Connection index built on `petgraph`.

use std::collections::HashMap;

use orrery_core::NodeKey;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::connection::{Connection, FlowPath};
use crate::definition::ProcessDefinition;
use crate::error::DefinitionError;

/// Precomputed adjacency of a [`ProcessDefinition`].
///
/// Edge weights are indices into `definition.connections`, so lookups hand
/// back connections in declaration order. Cycles are legal (loops back to an
/// earlier node are a normal process pattern) and are only reported.
#[derive(Debug, Clone)]
pub struct ProcessGraph {
    graph: DiGraph<NodeKey, usize>,
    index_map: HashMap<NodeKey, NodeIndex>,
}

impl ProcessGraph {
    /// Build the index for `definition`.
    ///
    /// Returns an error if a connection references an unknown node or creates a self-loop.
    pub fn from_definition(definition: &ProcessDefinition) -> Result<Self, DefinitionError> {
        let mut graph = DiGraph::new();
        let mut index_map = HashMap::new();

        for node in &definition.nodes {
            let idx = graph.add_node(node.key.clone());
            index_map.insert(node.key.clone(), idx);
        }

        for (position, conn) in definition.connections.iter().enumerate() {
            let from_idx = index_map
                .get(&conn.from)
                .ok_or_else(|| DefinitionError::UnknownNode(conn.from.clone()))?;
            let to_idx = index_map
                .get(&conn.to)
                .ok_or_else(|| DefinitionError::UnknownNode(conn.to.clone()))?;
            if conn.is_self_loop() {
                return Err(DefinitionError::SelfLoop(conn.from.clone()));
            }
            graph.add_edge(*from_idx, *to_idx, position);
        }

        Ok(Self { graph, index_map })
    }

    /// Returns `true` if the graph contains at least one cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Connection indices leaving `key`, in declaration order.
    #[must_use]
    pub fn outgoing_indices(&self, key: &NodeKey) -> Vec<usize> {
        let Some(&idx) = self.index_map.get(key) else {
            return Vec::new();
        };
        let mut found: Vec<usize> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| *e.weight())
            .collect();
        found.sort_unstable();
        found
    }

    /// Connections leaving `key` on `path`, in declaration order.
    #[must_use]
    pub fn outgoing<'d>(
        &self,
        definition: &'d ProcessDefinition,
        key: &NodeKey,
        path: FlowPath,
    ) -> Vec<&'d Connection> {
        self.outgoing_indices(key)
            .into_iter()
            .filter_map(|i| definition.connections.get(i))
            .filter(|c| c.path == path)
            .collect()
    }

    /// Number of connections arriving at `key`.
    #[must_use]
    pub fn incoming_count(&self, key: &NodeKey) -> usize {
        self.index_map.get(key).map_or(0, |&idx| {
            self.graph.edges_directed(idx, Direction::Incoming).count()
        })
    }

    /// Keys of every node `key` has a connection to.
    #[must_use]
    pub fn successors(&self, key: &NodeKey) -> Vec<&NodeKey> {
        let Some(&idx) = self.index_map.get(key) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| &self.graph[e.target()])
            .collect()
    }

    /// Total number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Total number of connections in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

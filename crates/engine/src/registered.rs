//! Definitions as held by a running engine.

use std::collections::HashMap;
use std::sync::Arc;

use orrery_definition::{
    DefinitionError, NodeDefinition, ProcessDefinition, ProcessGraph, Transformation,
    validate_definition,
};

use crate::transform::{CompiledTransformation, TransformationCache, Transformer};

/// A validated definition with its graph index and compiled transformations.
///
/// Immutable once built; instances hold it by `Arc` so re-registering a key
/// never affects instances already running.
#[derive(Debug)]
pub struct RegisteredDefinition {
    definition: ProcessDefinition,
    graph: ProcessGraph,
    transformations: TransformationCache,
}

impl RegisteredDefinition {
    /// Validate, index, and compile `definition`.
    pub fn build(
        definition: ProcessDefinition,
        transformers: &HashMap<String, Arc<dyn Transformer>>,
    ) -> Result<Self, DefinitionError> {
        if let Some(err) = DefinitionError::from_issues(validate_definition(&definition)) {
            return Err(err);
        }
        let graph = ProcessGraph::from_definition(&definition)?;
        let transformations = TransformationCache::compile(&definition, transformers)?;
        Ok(Self {
            definition,
            graph,
            transformations,
        })
    }

    /// The definition.
    #[must_use]
    pub fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    /// The connection index.
    #[must_use]
    pub fn graph(&self) -> &ProcessGraph {
        &self.graph
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, key: &str) -> Option<&NodeDefinition> {
        self.definition.node(key)
    }

    /// The compiled form of a transformation carried by this definition.
    #[must_use]
    pub fn transformation(
        &self,
        transformation: &Transformation,
    ) -> Option<Arc<dyn CompiledTransformation>> {
        self.transformations.get(transformation)
    }

    /// Number of distinct compiled transformations.
    #[must_use]
    pub fn compiled_transformations(&self) -> usize {
        self.transformations.len()
    }
}

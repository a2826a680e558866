//! Data transformations applied to task parameters and event payloads.
//!
//! A [`Transformer`] compiles expressions of one language into
//! [`CompiledTransformation`]s. Compilation happens once per distinct
//! (language, expression) pair when a definition is registered; instances
//! share the compiled form.

use std::collections::HashMap;
use std::sync::Arc;

use orrery_definition::{DefinitionError, ImportTable, ProcessDefinition, Transformation};
use serde_json::Value;

/// Transformation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// The expression does not compile.
    #[error("compile error: {0}")]
    Compile(String),

    /// Applying the compiled form failed.
    #[error("apply error: {0}")]
    Apply(String),
}

/// A reusable, compiled expression.
pub trait CompiledTransformation: Send + Sync + std::fmt::Debug {
    /// Apply to `input`. Task parameters receive the visible variables as an
    /// object; event transformations receive the delivered payload.
    fn apply(&self, input: &Value) -> Result<Value, TransformError>;
}

/// Compiles expressions of one language.
pub trait Transformer: Send + Sync {
    /// Language key matched against [`Transformation::language`].
    fn language(&self) -> &str;

    /// Compile `expression`, resolving namespaces against `imports`.
    fn compile(
        &self,
        expression: &str,
        imports: &ImportTable,
    ) -> Result<Arc<dyn CompiledTransformation>, TransformError>;
}

/// Compiled transformations of one definition, keyed by (language, expression).
#[derive(Debug, Default)]
pub struct TransformationCache {
    compiled: HashMap<Transformation, Arc<dyn CompiledTransformation>>,
}

impl TransformationCache {
    /// Compile every transformation `definition` carries.
    pub fn compile(
        definition: &ProcessDefinition,
        transformers: &HashMap<String, Arc<dyn Transformer>>,
    ) -> Result<Self, DefinitionError> {
        let mut compiled: HashMap<Transformation, Arc<dyn CompiledTransformation>> =
            HashMap::new();
        for (node, transformation) in definition.transformations() {
            if compiled.contains_key(transformation) {
                continue;
            }
            let transformer = transformers.get(&transformation.language).ok_or_else(|| {
                DefinitionError::Transformation {
                    node: node.clone(),
                    reason: format!("no transformer for language `{}`", transformation.language),
                }
            })?;
            let form = transformer
                .compile(&transformation.expression, &definition.imports)
                .map_err(|e| DefinitionError::Transformation {
                    node: node.clone(),
                    reason: e.to_string(),
                })?;
            compiled.insert(transformation.clone(), form);
        }
        Ok(Self { compiled })
    }

    /// The compiled form of `transformation`.
    #[must_use]
    pub fn get(&self, transformation: &Transformation) -> Option<Arc<dyn CompiledTransformation>> {
        self.compiled.get(transformation).cloned()
    }

    /// Number of distinct compiled transformations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Whether the definition carries no transformation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Dotted-path transformer, language `"path"`.
///
/// `order.lines.0.sku` walks objects by key and arrays by index. A leading
/// `namespace::` must name a typed import of the definition. Missing
/// segments yield `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTransformer;

impl PathTransformer {
    /// Language key.
    pub const LANGUAGE: &'static str = "path";
}

#[derive(Debug)]
struct CompiledPath {
    segments: Vec<String>,
}

impl CompiledTransformation for CompiledPath {
    fn apply(&self, input: &Value) -> Result<Value, TransformError> {
        let mut current = input;
        for segment in &self.segments {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                Value::Null => None,
                other => {
                    return Err(TransformError::Apply(format!(
                        "cannot index {other} with `{segment}`"
                    )));
                }
            };
            match next {
                Some(value) => current = value,
                None => return Ok(Value::Null),
            }
        }
        Ok(current.clone())
    }
}

impl Transformer for PathTransformer {
    fn language(&self) -> &str {
        Self::LANGUAGE
    }

    fn compile(
        &self,
        expression: &str,
        imports: &ImportTable,
    ) -> Result<Arc<dyn CompiledTransformation>, TransformError> {
        let path = match expression.trim().split_once("::") {
            Some((namespace, rest)) => {
                if imports.location_of(namespace).is_none() {
                    return Err(TransformError::Compile(format!(
                        "namespace `{namespace}` is not imported"
                    )));
                }
                rest
            }
            None => expression.trim(),
        };
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(TransformError::Compile(format!(
                "malformed path `{expression}`"
            )));
        }
        Ok(Arc::new(CompiledPath { segments }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_core::{NodeKey, ProcessKey, TaskType};
    use orrery_definition::{NodeDefinition, NodeKind, ParameterSource, TaskNode};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn compile(expr: &str, imports: &ImportTable) -> Result<Value, TransformError> {
        let form = PathTransformer.compile(expr, imports)?;
        form.apply(&json!({"order": {"lines": [{"sku": "A-1"}], "total": 12}}))
    }

    #[test]
    fn walks_objects_and_arrays() {
        let imports = ImportTable::new();
        assert_eq!(compile("order.lines.0.sku", &imports).unwrap(), json!("A-1"));
        assert_eq!(compile("order.total", &imports).unwrap(), json!(12));
        assert_eq!(compile("order.missing.deeper", &imports).unwrap(), Value::Null);
    }

    #[test]
    fn namespace_must_be_imported() {
        let imports = ImportTable::new().with_typed("schema", "shop", "shop.json");
        assert_eq!(compile("shop::order.total", &imports).unwrap(), json!(12));
        assert!(matches!(
            compile("other::order", &imports),
            Err(TransformError::Compile(_))
        ));
    }

    #[test]
    fn rejects_malformed_and_scalar_indexing() {
        let imports = ImportTable::new();
        assert!(matches!(compile("order..x", &imports), Err(TransformError::Compile(_))));
        assert!(matches!(
            compile("order.total.x", &imports),
            Err(TransformError::Apply(_))
        ));
    }

    #[test]
    fn cache_compiles_each_pair_once_and_reports_missing_language() {
        let task = |expr: &str| {
            TaskNode::new(TaskType::new("t").unwrap())
                .with_parameter("p", ParameterSource::transformation("path", expr))
        };
        let mut def = ProcessDefinition::new(ProcessKey::new("p").unwrap());
        def.nodes = vec![
            NodeDefinition::new(NodeKey::new("a").unwrap(), NodeKind::Task(task("x.y"))),
            NodeDefinition::new(NodeKey::new("b").unwrap(), NodeKind::Task(task("x.y"))),
        ];

        let mut transformers: HashMap<String, Arc<dyn Transformer>> = HashMap::new();
        let err = TransformationCache::compile(&def, &transformers).unwrap_err();
        assert!(matches!(err, DefinitionError::Transformation { .. }));

        transformers.insert("path".into(), Arc::new(PathTransformer));
        let cache = TransformationCache::compile(&def, &transformers).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&Transformation::new("path", "x.y")).is_some());
    }
}

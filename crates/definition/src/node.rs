//! Node definitions: the typed steps of a process graph.

use std::collections::BTreeMap;

use orrery_core::{NodeKey, TaskType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::strategy::{HandlingStrategy, RetryConfig};
use crate::variable::VariableDeclaration;

/// A single node inside a process graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique node key within this definition.
    pub key: NodeKey,
    /// Human-readable label.
    #[serde(default)]
    pub name: String,
    /// Enclosing sub-process, `None` for top-level nodes.
    #[serde(default)]
    pub container: Option<NodeKey>,
    /// Variant-specific configuration.
    pub kind: NodeKind,
    /// Free-form extension data. Never read by the engine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl NodeDefinition {
    /// Create a top-level node named after its key.
    #[must_use]
    pub fn new(key: NodeKey, kind: NodeKind) -> Self {
        Self {
            name: key.to_string(),
            key,
            container: None,
            kind,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Place the node inside a sub-process.
    #[must_use]
    pub fn within(mut self, container: NodeKey) -> Self {
        self.container = Some(container);
        self
    }

    /// Attach an extension metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns `true` for start nodes.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self.kind, NodeKind::Start)
    }

    /// Short variant label used in logs and errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Start => "start",
            NodeKind::End { .. } => "end",
            NodeKind::Task(_) => "task",
            NodeKind::EventWait(_) => "event_wait",
            NodeKind::Gateway(_) => "gateway",
            NodeKind::SubProcess(_) => "sub_process",
        }
    }
}

/// The node variants the engine knows how to activate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point of the process or of a sub-process.
    Start,
    /// Exit point. A terminating end aborts every sibling still active.
    End {
        /// Abort the rest of the enclosing container on arrival.
        #[serde(default)]
        terminate: bool,
    },
    /// Delegates work to an external handler.
    Task(TaskNode),
    /// Waits for a timer, signal, or message.
    EventWait(EventNode),
    /// Routes flow by evaluating outgoing conditions.
    Gateway(GatewayNode),
    /// Groups inner nodes under a child variable scope.
    SubProcess(SubProcessNode),
}

/// Configuration of a task node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    /// Handler key the work item is dispatched to.
    pub task_type: TaskType,
    /// Work item parameters and where their values come from.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSource>,
    /// Result entries copied into variables on completion.
    #[serde(default)]
    pub outputs: Vec<DataMapping>,
    /// Strategy applied when the handler faults without naming one.
    #[serde(default)]
    pub strategy: Option<HandlingStrategy>,
    /// Node-level retry policy, overriding the engine default.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl TaskNode {
    /// Create a task for the given handler key.
    #[must_use]
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            parameters: BTreeMap::new(),
            outputs: Vec::new(),
            strategy: None,
            retry: None,
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, source: ParameterSource) -> Self {
        self.parameters.insert(name.into(), source);
        self
    }

    /// Copy result `from` into variable `to` on completion.
    #[must_use]
    pub fn with_output(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.outputs.push(DataMapping::new(from, to));
        self
    }

    /// Set the node's default handling strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: HandlingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set a node-level retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Where a work item parameter takes its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterSource {
    /// A fixed value.
    Literal {
        /// The value.
        value: Value,
    },
    /// The current value of a variable, resolved through the scope chain.
    Variable {
        /// Variable name.
        name: String,
    },
    /// The result of a compiled transformation over the variables.
    Transformation(Transformation),
}

impl ParameterSource {
    /// Construct a literal parameter.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        Self::Literal { value }
    }

    /// Construct a variable parameter.
    #[must_use]
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable { name: name.into() }
    }

    /// Construct a transformation parameter.
    #[must_use]
    pub fn transformation(language: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::Transformation(Transformation::new(language, expression))
    }
}

/// An expression in a named language, compiled once per definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformation {
    /// Language key the engine resolves a transformer by.
    pub language: String,
    /// Source text.
    pub expression: String,
}

impl Transformation {
    /// Create a transformation.
    #[must_use]
    pub fn new(language: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            expression: expression.into(),
        }
    }
}

/// Copies one entry of a result or payload into a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMapping {
    /// Key in the result mapping.
    pub from: String,
    /// Target variable name.
    pub to: String,
}

impl DataMapping {
    /// Create a mapping.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Configuration of an event wait node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNode {
    /// What the node waits for.
    pub trigger: EventTrigger,
    /// Applied to the delivered payload before outputs are mapped.
    #[serde(default)]
    pub transformation: Option<Transformation>,
    /// Payload entries copied into variables on delivery.
    #[serde(default)]
    pub outputs: Vec<DataMapping>,
    /// Variable receiving the whole (transformed) payload.
    #[serde(default)]
    pub payload_variable: Option<String>,
}

impl EventNode {
    /// Wait for the given trigger.
    #[must_use]
    pub fn new(trigger: EventTrigger) -> Self {
        Self {
            trigger,
            transformation: None,
            outputs: Vec::new(),
            payload_variable: None,
        }
    }

    /// Wait for a plain signal.
    #[must_use]
    pub fn signal(name: impl Into<String>) -> Self {
        Self::new(EventTrigger::Signal { name: name.into() })
    }

    /// Wait for a message, optionally correlated by a variable's value.
    #[must_use]
    pub fn message(name: impl Into<String>, correlation_variable: Option<String>) -> Self {
        Self::new(EventTrigger::Message {
            name: name.into(),
            correlation_variable,
        })
    }

    /// Wait for a timer.
    #[must_use]
    pub fn timer(expression: impl Into<String>) -> Self {
        Self::new(EventTrigger::Timer {
            expression: expression.into(),
        })
    }

    /// Transform the payload before mapping it.
    #[must_use]
    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformation = Some(transformation);
        self
    }

    /// Copy payload entry `from` into variable `to`.
    #[must_use]
    pub fn with_output(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.outputs.push(DataMapping::new(from, to));
        self
    }

    /// Store the whole payload in `variable`.
    #[must_use]
    pub fn with_payload_variable(mut self, variable: impl Into<String>) -> Self {
        self.payload_variable = Some(variable.into());
        self
    }
}

/// What an event wait node is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventTrigger {
    /// A timer scheduled through the host's timer service.
    Timer {
        /// Expression understood by the timer service (e.g. `"PT5M"`).
        expression: String,
    },
    /// A named signal.
    Signal {
        /// Signal name.
        name: String,
    },
    /// A named message, optionally keyed by correlation data.
    Message {
        /// Message name.
        name: String,
        /// Variable whose value disambiguates the wait.
        #[serde(default)]
        correlation_variable: Option<String>,
    },
}

/// Configuration of a gateway node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNode {
    /// Routing behaviour.
    pub kind: GatewayKind,
}

/// How a gateway routes and merges flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    /// First satisfied connection wins, default connection otherwise.
    Exclusive,
    /// Every satisfied connection fires, default connection if none.
    Inclusive,
    /// Every connection fires; with several incoming connections it joins.
    Parallel,
}

/// Configuration of a sub-process node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubProcessNode {
    /// Variables local to the sub-process scope.
    #[serde(default)]
    pub variables: Vec<VariableDeclaration>,
}

impl SubProcessNode {
    /// Declare a scope-local variable.
    #[must_use]
    pub fn with_variable(mut self, declaration: VariableDeclaration) -> Self {
        self.variables.push(declaration);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn task_node_serializes_with_type_tag() {
        let node = NodeDefinition::new(
            NodeKey::new("review").unwrap(),
            NodeKind::Task(
                TaskNode::new(TaskType::new("Human Task").unwrap())
                    .with_parameter("approver", ParameterSource::variable("manager"))
                    .with_strategy(HandlingStrategy::Abort),
            ),
        );
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["kind"]["type"], json!("task"));
        assert_eq!(value["kind"]["task_type"], json!("Human Task"));
        assert_eq!(value["kind"]["strategy"], json!("ABORT"));
        assert_eq!(
            value["kind"]["parameters"]["approver"],
            json!({"type": "variable", "name": "manager"})
        );
    }

    #[test]
    fn end_defaults_to_non_terminating() {
        let kind: NodeKind = serde_json::from_value(json!({"type": "end"})).unwrap();
        assert_eq!(kind, NodeKind::End { terminate: false });
    }

    #[test]
    fn message_trigger_parses_correlation_variable() {
        let kind: NodeKind = serde_json::from_value(json!({
            "type": "event_wait",
            "trigger": {"type": "message", "name": "payment", "correlation_variable": "orderId"}
        }))
        .unwrap();
        let NodeKind::EventWait(event) = kind else {
            panic!("expected event wait");
        };
        assert_eq!(
            event.trigger,
            EventTrigger::Message {
                name: "payment".into(),
                correlation_variable: Some("orderId".into()),
            }
        );
    }

    #[test]
    fn new_node_is_named_after_key() {
        let node = NodeDefinition::new(NodeKey::new("start").unwrap(), NodeKind::Start);
        assert_eq!(node.name, "start");
        assert!(node.is_start());
        assert_eq!(node.kind_name(), "start");
    }
}

//! Connections linking process nodes.

use orrery_core::NodeKey;
use serde::{Deserialize, Serialize};

/// Which completion of the source node a connection is followed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPath {
    /// Followed when the source node completes.
    #[default]
    Normal,
    /// Followed only when the source node is aborted.
    OnAbort,
}

/// A directed edge from one node to another, optionally conditional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Source node.
    pub from: NodeKey,
    /// Target node.
    pub to: NodeKey,
    /// Expression handed to the condition evaluator; `None` always passes.
    #[serde(default)]
    pub condition: Option<String>,
    /// Completion path this connection belongs to.
    #[serde(default)]
    pub path: FlowPath,
    /// Taken by a gateway when no other condition holds.
    #[serde(default)]
    pub is_default: bool,
}

impl Connection {
    /// Create an unconditional connection on the normal path.
    #[must_use]
    pub fn new(from: NodeKey, to: NodeKey) -> Self {
        Self {
            from,
            to,
            condition: None,
            path: FlowPath::Normal,
            is_default: false,
        }
    }

    /// Guard the connection with a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Follow this connection only when the source node is aborted.
    #[must_use]
    pub fn on_abort(mut self) -> Self {
        self.path = FlowPath::OnAbort;
        self
    }

    /// Mark as the gateway's default connection.
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Returns `true` if this connection forms a self-loop.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(s: &str) -> NodeKey {
        NodeKey::new(s).unwrap()
    }

    #[test]
    fn defaults_to_unconditional_normal_path() {
        let conn = Connection::new(key("a"), key("b"));
        assert_eq!(conn.condition, None);
        assert_eq!(conn.path, FlowPath::Normal);
        assert!(!conn.is_default);
        assert!(!conn.is_self_loop());
    }

    #[test]
    fn builder_methods_compose() {
        let conn = Connection::new(key("a"), key("b"))
            .with_condition("approved")
            .on_abort()
            .as_default();
        assert_eq!(conn.condition.as_deref(), Some("approved"));
        assert_eq!(conn.path, FlowPath::OnAbort);
        assert!(conn.is_default);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let conn: Connection = serde_json::from_str(r#"{"from": "a", "to": "a"}"#).unwrap();
        assert_eq!(conn.path, FlowPath::Normal);
        assert!(conn.is_self_loop());
    }
}

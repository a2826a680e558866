//! Fluent builder for constructing and validating process definitions.

use orrery_core::{NodeKey, ProcessKey};
use serde_json::Value;

use crate::connection::Connection;
use crate::definition::ProcessDefinition;
use crate::error::DefinitionError;
use crate::import::ImportTable;
use crate::node::{
    EventNode, GatewayKind, GatewayNode, NodeDefinition, NodeKind, SubProcessNode, TaskNode,
};
use crate::validate::validate_definition;
use crate::variable::VariableDeclaration;

/// A builder that accumulates nodes, connections, and declarations, then
/// validates and produces a [`ProcessDefinition`].
///
/// Keys are given as plain strings; the first invalid key is remembered and
/// reported by [`build`](Self::build).
///
/// ```rust,ignore
/// let definition = ProcessDefinitionBuilder::new("orders")
///     .start("start")
///     .task("review", TaskNode::new(TaskType::new("Human Task")?))
///     .end("end")
///     .connect("start", "review")
///     .connect("review", "end")
///     .build()?;
/// ```
#[derive(Debug)]
pub struct ProcessDefinitionBuilder {
    id: String,
    name: Option<String>,
    version: u32,
    nodes: Vec<NodeDefinition>,
    connections: Vec<Connection>,
    variables: Vec<VariableDeclaration>,
    imports: ImportTable,
    container: Option<NodeKey>,
    first_error: Option<DefinitionError>,
}

impl ProcessDefinitionBuilder {
    /// Start building a definition with the given process key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: 1,
            nodes: Vec::new(),
            connections: Vec::new(),
            variables: Vec::new(),
            imports: ImportTable::default(),
            container: None,
            first_error: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the definition revision.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Add a fully specified node. Its container is left as given.
    #[must_use]
    pub fn node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a start node to the current container.
    #[must_use]
    pub fn start(self, key: &str) -> Self {
        self.push(key, NodeKind::Start)
    }

    /// Add a plain end node to the current container.
    #[must_use]
    pub fn end(self, key: &str) -> Self {
        self.push(key, NodeKind::End { terminate: false })
    }

    /// Add a terminating end node to the current container.
    #[must_use]
    pub fn terminate_end(self, key: &str) -> Self {
        self.push(key, NodeKind::End { terminate: true })
    }

    /// Add a task node to the current container.
    #[must_use]
    pub fn task(self, key: &str, task: TaskNode) -> Self {
        self.push(key, NodeKind::Task(task))
    }

    /// Add an event wait node to the current container.
    #[must_use]
    pub fn event(self, key: &str, event: EventNode) -> Self {
        self.push(key, NodeKind::EventWait(event))
    }

    /// Add a gateway to the current container.
    #[must_use]
    pub fn gateway(self, key: &str, kind: GatewayKind) -> Self {
        self.push(key, NodeKind::Gateway(GatewayNode { kind }))
    }

    /// Add a sub-process; nodes added inside `body` belong to it.
    #[must_use]
    pub fn sub_process(
        self,
        key: &str,
        node: SubProcessNode,
        body: impl FnOnce(Self) -> Self,
    ) -> Self {
        let mut this = self.push(key, NodeKind::SubProcess(node));
        let outer = this.container.take();
        this.container = NodeKey::new(key).ok();
        let mut this = body(this);
        this.container = outer;
        this
    }

    /// Add an unconditional connection.
    #[must_use]
    pub fn connect(self, from: &str, to: &str) -> Self {
        self.connect_with(from, to, |c| c)
    }

    /// Add a conditional connection.
    #[must_use]
    pub fn connect_when(self, from: &str, to: &str, condition: &str) -> Self {
        self.connect_with(from, to, |c| c.with_condition(condition))
    }

    /// Add a gateway default connection.
    #[must_use]
    pub fn connect_default(self, from: &str, to: &str) -> Self {
        self.connect_with(from, to, Connection::as_default)
    }

    /// Add a connection followed only when `from` is aborted.
    #[must_use]
    pub fn connect_on_abort(self, from: &str, to: &str) -> Self {
        self.connect_with(from, to, Connection::on_abort)
    }

    /// Declare a root-scope variable.
    #[must_use]
    pub fn variable(mut self, declaration: VariableDeclaration) -> Self {
        self.variables.push(declaration);
        self
    }

    /// Declare an untyped root-scope variable with a default.
    #[must_use]
    pub fn variable_default(self, name: &str, value: Value) -> Self {
        self.variable(VariableDeclaration::new(name).with_default(value))
    }

    /// Replace the import table.
    #[must_use]
    pub fn imports(mut self, imports: ImportTable) -> Self {
        self.imports = imports;
        self
    }

    /// Validate and produce the definition, failing on the first issue.
    pub fn build(self) -> Result<ProcessDefinition, DefinitionError> {
        if let Some(err) = self.first_error {
            return Err(err);
        }
        let id = parse_key::<ProcessKey>(&self.id)?;
        let definition = ProcessDefinition {
            name: self.name.unwrap_or_else(|| id.to_string()),
            id,
            version: self.version,
            nodes: self.nodes,
            connections: self.connections,
            variables: self.variables,
            imports: self.imports,
            metadata: Default::default(),
        };
        match validate_definition(&definition).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(definition),
        }
    }

    fn push(mut self, key: &str, kind: NodeKind) -> Self {
        match parse_key::<NodeKey>(key) {
            Ok(key) => {
                let mut node = NodeDefinition::new(key, kind);
                node.container = self.container.clone();
                self.nodes.push(node);
            }
            Err(err) => self.remember(err),
        }
        self
    }

    fn connect_with(
        mut self,
        from: &str,
        to: &str,
        shape: impl FnOnce(Connection) -> Connection,
    ) -> Self {
        match (parse_key::<NodeKey>(from), parse_key::<NodeKey>(to)) {
            (Ok(from), Ok(to)) => self.connections.push(shape(Connection::new(from, to))),
            (Err(err), _) | (_, Err(err)) => self.remember(err),
        }
        self
    }

    fn remember(&mut self, err: DefinitionError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}

fn parse_key<K>(raw: &str) -> Result<K, DefinitionError>
where
    K: std::str::FromStr<Err = orrery_core::KeyError>,
{
    raw.parse().map_err(|source| DefinitionError::InvalidKey {
        value: raw.to_owned(),
        source,
    })
}

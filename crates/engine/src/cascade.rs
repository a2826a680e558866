//! Node activation cascade.
//!
//! A [`Run`] owns the instance lock for the duration of one engine
//! operation. Steps are taken off a LIFO agenda until it is empty or the
//! instance leaves ACTIVE, so the cascade is depth-first and never yields
//! to another operation on the same instance.

use std::sync::Arc;

use chrono::Utc;
use orrery_core::{NodeInstanceId, NodeKey};
use orrery_definition::{
    EventNode, EventTrigger, FlowPath, GatewayKind, GatewayNode, NodeKind, SubProcessNode,
};
use orrery_execution::{
    AgendaItem, CorrelationKey, ErrorContext, ErrorKind, JournalEntry, NodeInstance,
    NodeInstanceState, NodeWait, ProcessState, ScopeId, VariableError,
};
use serde_json::Value;

use crate::dispatch::Captured;
use crate::engine::{EngineInner, ProcessEngine};
use crate::instance::ProcessInstance;
use crate::timer::TimerTarget;

pub(crate) struct Run<'a> {
    pub(crate) engine: &'a Arc<EngineInner>,
    pub(crate) instance: &'a mut ProcessInstance,
    agenda: Vec<AgendaItem>,
}

impl Drop for Run<'_> {
    fn drop(&mut self) {
        let Some((_, leftover)) = self.engine.queued.remove(&self.instance.id) else {
            return;
        };
        if leftover.is_empty() {
            return;
        }
        // Reported after the last drain: apply once the lock is released.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                instance_id = %self.instance.id,
                dropped = leftover.len(),
                "no runtime to apply queued work item outcomes"
            );
            return;
        };
        let engine = ProcessEngine::from_inner(Arc::clone(self.engine));
        runtime.spawn(async move {
            for (work_item, outcome) in leftover {
                if let Err(err) = engine.apply_outcome(work_item, outcome).await {
                    tracing::warn!(work_item_id = %work_item, error = %err, "queued work item outcome rejected");
                }
            }
        });
    }
}

impl<'a> Run<'a> {
    pub(crate) fn new(engine: &'a Arc<EngineInner>, instance: &'a mut ProcessInstance) -> Self {
        engine.queued.insert(instance.id, Vec::new());
        Self {
            engine,
            instance,
            agenda: Vec::new(),
        }
    }

    /// Queue the top-level start nodes.
    pub(crate) fn start(&mut self) {
        let definition = Arc::clone(&self.instance.definition);
        let starts: Vec<NodeKey> = definition
            .definition()
            .start_nodes(None)
            .map(|n| n.key.clone())
            .collect();
        for start in starts.into_iter().rev() {
            self.schedule(start, None);
        }
    }

    /// Queue an activation of `node` inside `container`.
    pub(crate) fn schedule(&mut self, node: NodeKey, container: Option<NodeInstanceId>) {
        let scope = self.instance.container_scope(container);
        self.agenda.push(AgendaItem::Activate {
            node,
            container,
            scope,
        });
    }

    pub(crate) fn push(&mut self, step: AgendaItem) {
        self.agenda.push(step);
    }

    /// Restore the steps an earlier failure left behind.
    pub(crate) fn take_deferred(&mut self) {
        let deferred = std::mem::take(&mut self.instance.deferred);
        self.agenda.extend(deferred);
    }

    /// Run the agenda to the next settled point.
    ///
    /// Outcomes queued for this instance while the cascade held its lock
    /// are applied each time the agenda runs dry.
    pub(crate) async fn settle(mut self) {
        loop {
            if self.instance.state != ProcessState::Active {
                break;
            }
            let step = match self.agenda.pop() {
                Some(step) => step,
                None if self.apply_queued() => continue,
                None => break,
            };
            match step {
                AgendaItem::Activate {
                    node,
                    container,
                    scope,
                } => self.activate(node, container, scope).await,
                AgendaItem::CheckContainer { container } => self.check_container(container),
            }
        }

        match self.instance.state {
            ProcessState::Active if self.instance.nodes.is_empty() => self.complete_instance(),
            ProcessState::Error => self.instance.deferred = std::mem::take(&mut self.agenda),
            _ => {}
        }
    }

    fn apply_queued(&mut self) -> bool {
        let queued = match self.engine.queued.get_mut(&self.instance.id) {
            Some(mut queue) => std::mem::take(queue.value_mut()),
            None => return false,
        };
        if queued.is_empty() {
            return false;
        }
        for (work_item, outcome) in queued {
            tracing::debug!(
                instance_id = %self.instance.id,
                work_item_id = %work_item,
                "applying queued work item outcome"
            );
            match outcome {
                Captured::Complete(results) => self.complete_work_item(work_item, results),
                Captured::Abort => self.abort_work_item(work_item),
            }
        }
        true
    }

    async fn activate(&mut self, key: NodeKey, container: Option<NodeInstanceId>, scope: ScopeId) {
        if let Some(c) = container
            && !self.instance.nodes.contains_key(&c)
        {
            tracing::debug!(node = %key, "container left before activation, skipping");
            return;
        }
        let definition = Arc::clone(&self.instance.definition);
        let Some(node) = definition.node(key.as_str()) else {
            self.fail(ErrorContext::new(
                ErrorKind::Configuration,
                format!("node `{key}` is not part of the definition"),
            ));
            return;
        };

        if let NodeKind::Gateway(GatewayNode {
            kind: GatewayKind::Parallel,
        }) = node.kind
        {
            let incoming = definition.graph().incoming_count(&key);
            if incoming > 1 {
                let arrivals = self
                    .instance
                    .joins
                    .entry((container, key.clone()))
                    .or_insert(0);
                *arrivals += 1;
                if *arrivals < incoming {
                    tracing::debug!(
                        instance_id = %self.instance.id,
                        node = %key,
                        arrivals = *arrivals,
                        incoming,
                        "parallel join waiting"
                    );
                    self.agenda.push(AgendaItem::CheckContainer { container });
                    return;
                }
                self.instance.joins.remove(&(container, key.clone()));
            }
        }

        let node_instance = NodeInstance::new(key.clone(), container, scope);
        let id = node_instance.id;
        self.instance.nodes.insert(id, node_instance);
        self.instance.journal.push(JournalEntry::NodeEntered {
            timestamp: Utc::now(),
            node: key.clone(),
            node_instance: id,
        });
        tracing::debug!(
            instance_id = %self.instance.id,
            node = %key,
            kind = node.kind_name(),
            "node entered"
        );

        match &node.kind {
            NodeKind::Start | NodeKind::End { terminate: false } => {
                self.leave(id, NodeInstanceState::Completed);
            }
            NodeKind::End { terminate: true } => {
                self.terminate(id).await;
                self.leave(id, NodeInstanceState::Completed);
            }
            NodeKind::Task(task) => self.dispatch_task(id, task).await,
            NodeKind::EventWait(event) => self.register_wait(id, event),
            NodeKind::Gateway(gateway) => self.route(id, gateway.kind),
            NodeKind::SubProcess(sub) => self.enter_sub_process(id, &key, sub),
        }
    }

    /// Leave `id`, following the connections of the matching path whose
    /// condition holds.
    pub(crate) fn leave(&mut self, id: NodeInstanceId, outcome: NodeInstanceState) {
        let path = match outcome {
            NodeInstanceState::Aborted => FlowPath::OnAbort,
            _ => FlowPath::Normal,
        };
        let definition = Arc::clone(&self.instance.definition);
        let Some(node_instance) = self.instance.nodes.get(&id) else {
            return;
        };
        let key = node_instance.node.clone();
        let variables = self.instance.scopes.visible(node_instance.scope);
        let conditions = self.engine.conditions();

        let mut targets = Vec::new();
        for connection in definition
            .graph()
            .outgoing(definition.definition(), &key, path)
        {
            let taken = match &connection.condition {
                None => true,
                Some(condition) => match conditions.evaluate(condition, &variables) {
                    Ok(taken) => taken,
                    Err(err) => {
                        self.fail(
                            ErrorContext::new(ErrorKind::Condition, err.to_string()).at_node(key, id),
                        );
                        return;
                    }
                },
            };
            if taken {
                targets.push(connection.to.clone());
            }
        }
        self.leave_to(id, outcome, targets);
    }

    fn leave_to(&mut self, id: NodeInstanceId, outcome: NodeInstanceState, targets: Vec<NodeKey>) {
        let Some(mut node_instance) = self.instance.nodes.remove(&id) else {
            return;
        };
        let owned_scope = matches!(node_instance.wait, NodeWait::Children);
        let left = match outcome {
            NodeInstanceState::Aborted => node_instance.abort(),
            _ => node_instance.complete(),
        };
        if let Err(err) = left {
            tracing::warn!(node = %node_instance.node, error = %err, "node instance already left");
            return;
        }
        if owned_scope {
            self.instance.scopes.close(node_instance.scope);
            self.instance.joins.retain(|(c, _), _| *c != Some(id));
        }

        let timestamp = Utc::now();
        let node = node_instance.node.clone();
        self.instance.journal.push(match outcome {
            NodeInstanceState::Aborted => JournalEntry::NodeAborted {
                timestamp,
                node,
                node_instance: id,
            },
            _ => JournalEntry::NodeCompleted {
                timestamp,
                node,
                node_instance: id,
            },
        });
        tracing::debug!(
            instance_id = %self.instance.id,
            node = %node_instance.node,
            state = %outcome,
            next = targets.len(),
            "node left"
        );

        let container = node_instance.container;
        self.agenda.push(AgendaItem::CheckContainer { container });
        for target in targets.into_iter().rev() {
            self.schedule(target, container);
        }
    }

    fn check_container(&mut self, container: Option<NodeInstanceId>) {
        let Some(id) = container else {
            return;
        };
        let Some(node_instance) = self.instance.nodes.get(&id) else {
            return;
        };
        if !matches!(node_instance.wait, NodeWait::Children) {
            return;
        }
        let pending = self.agenda.iter().any(|step| {
            matches!(step, AgendaItem::Activate { container: Some(c), .. } if *c == id)
        });
        if !pending && self.instance.children_of(Some(id)).is_empty() {
            self.leave(id, NodeInstanceState::Completed);
        }
    }

    fn route(&mut self, id: NodeInstanceId, kind: GatewayKind) {
        let definition = Arc::clone(&self.instance.definition);
        let Some(node_instance) = self.instance.nodes.get(&id) else {
            return;
        };
        let key = node_instance.node.clone();
        let variables = self.instance.scopes.visible(node_instance.scope);
        let outgoing = definition
            .graph()
            .outgoing(definition.definition(), &key, FlowPath::Normal);

        if kind == GatewayKind::Parallel {
            let targets = outgoing.iter().map(|c| c.to.clone()).collect();
            self.leave_to(id, NodeInstanceState::Completed, targets);
            return;
        }

        let conditions = self.engine.conditions();
        let mut chosen = Vec::new();
        let mut default = None;
        for connection in outgoing {
            if connection.is_default {
                default = Some(connection.to.clone());
                continue;
            }
            let taken = match &connection.condition {
                None => true,
                Some(condition) => match conditions.evaluate(condition, &variables) {
                    Ok(taken) => taken,
                    Err(err) => {
                        self.fail(
                            ErrorContext::new(ErrorKind::Condition, err.to_string()).at_node(key, id),
                        );
                        return;
                    }
                },
            };
            if taken {
                chosen.push(connection.to.clone());
                if kind == GatewayKind::Exclusive {
                    break;
                }
            }
        }

        if chosen.is_empty() {
            match default {
                Some(target) => chosen.push(target),
                None => {
                    let message = format!("no outgoing connection of gateway `{key}` can be taken");
                    self.fail(ErrorContext::new(ErrorKind::Condition, message).at_node(key, id));
                    return;
                }
            }
        }
        self.leave_to(id, NodeInstanceState::Completed, chosen);
    }

    fn enter_sub_process(&mut self, id: NodeInstanceId, key: &NodeKey, sub: &SubProcessNode) {
        let definition = Arc::clone(&self.instance.definition);
        let parent = self.instance.container_scope(
            self.instance.nodes.get(&id).and_then(|n| n.container),
        );
        let child = match self.instance.scopes.open(parent, &sub.variables) {
            Ok(child) => child,
            Err(err) => {
                self.fail(
                    ErrorContext::new(ErrorKind::VariableResolution, err.to_string())
                        .at_node(key.clone(), id),
                );
                return;
            }
        };
        if let Some(node_instance) = self.instance.nodes.get_mut(&id) {
            node_instance.scope = child;
            node_instance.wait = NodeWait::Children;
        }

        self.agenda.push(AgendaItem::CheckContainer {
            container: Some(id),
        });
        let starts: Vec<NodeKey> = definition
            .definition()
            .start_nodes(Some(key))
            .map(|n| n.key.clone())
            .collect();
        for start in starts.into_iter().rev() {
            self.schedule(start, Some(id));
        }
    }

    fn register_wait(&mut self, id: NodeInstanceId, event: &EventNode) {
        let Some(node_instance) = self.instance.nodes.get(&id) else {
            return;
        };
        let node = node_instance.node.clone();
        let scope = node_instance.scope;

        let key = match &event.trigger {
            EventTrigger::Signal { name }
            | EventTrigger::Message {
                name,
                correlation_variable: None,
            } => CorrelationKey::signal(name.clone()),
            EventTrigger::Message {
                name,
                correlation_variable: Some(variable),
            } => match self.instance.scopes.resolve(scope, variable).map(|v| v.cloned()) {
                Ok(Some(Value::String(data))) => CorrelationKey::correlated(name.clone(), data),
                Ok(None | Some(Value::Null)) => {
                    let message = format!("correlation variable `{variable}` is not set");
                    self.fail(
                        ErrorContext::new(ErrorKind::VariableResolution, message).at_node(node, id),
                    );
                    return;
                }
                Ok(Some(other)) => CorrelationKey::correlated(name.clone(), other.to_string()),
                Err(err) => {
                    self.fail(
                        ErrorContext::new(ErrorKind::VariableResolution, err.to_string())
                            .at_node(node, id),
                    );
                    return;
                }
            },
            EventTrigger::Timer { expression } => {
                let target = TimerTarget {
                    instance: self.instance.id,
                    node_instance: id,
                };
                match self.engine.timers().schedule(expression, target) {
                    Ok(handle) => CorrelationKey::timer(handle),
                    Err(err) => {
                        self.fail(
                            ErrorContext::new(ErrorKind::Timer, err.to_string()).at_node(node, id),
                        );
                        return;
                    }
                }
            }
        };

        if let Some(node_instance) = self.instance.nodes.get_mut(&id) {
            node_instance.wait = NodeWait::Correlation { key: key.clone() };
        }
        self.engine
            .correlations
            .register(key.clone(), self.instance.id, id);
        tracing::debug!(instance_id = %self.instance.id, node = %node, key = %key, "waiting");
        self.instance.journal.push(JournalEntry::WaitRegistered {
            timestamp: Utc::now(),
            node_instance: id,
            key,
        });
    }

    /// Resume a node instance whose wait on `key` was satisfied.
    pub(crate) fn resolve_wait(&mut self, id: NodeInstanceId, key: &CorrelationKey, payload: Value) {
        let definition = Arc::clone(&self.instance.definition);
        let Some(node_instance) = self.instance.nodes.get_mut(&id) else {
            return;
        };
        if node_instance.correlation() != Some(key) {
            tracing::warn!(node_instance_id = %id, key = %key, "node instance is not waiting on this key");
            return;
        }
        node_instance.wait = NodeWait::Evaluating;
        let node = node_instance.node.clone();
        let scope = node_instance.scope;
        self.instance.journal.push(JournalEntry::WaitResolved {
            timestamp: Utc::now(),
            node_instance: id,
            key: key.clone(),
        });

        let Some(NodeKind::EventWait(event)) = definition.node(node.as_str()).map(|n| &n.kind)
        else {
            self.leave(id, NodeInstanceState::Completed);
            return;
        };

        let payload = match &event.transformation {
            None => payload,
            Some(transformation) => {
                let applied = definition
                    .transformation(transformation)
                    .map(|compiled| compiled.apply(&payload));
                match applied {
                    Some(Ok(value)) => value,
                    Some(Err(err)) => {
                        self.fail(
                            ErrorContext::new(ErrorKind::Transformation, err.to_string())
                                .at_node(node, id),
                        );
                        return;
                    }
                    None => {
                        self.fail(
                            ErrorContext::new(
                                ErrorKind::Transformation,
                                "transformation was not compiled",
                            )
                            .at_node(node, id),
                        );
                        return;
                    }
                }
            }
        };

        for mapping in &event.outputs {
            if let Some(value) = payload.get(mapping.from.as_str())
                && let Err(err) = self.set_variable(scope, &mapping.to, value.clone())
            {
                self.fail(
                    ErrorContext::new(ErrorKind::VariableResolution, err.to_string())
                        .at_node(node, id),
                );
                return;
            }
        }
        if let Some(variable) = &event.payload_variable
            && let Err(err) = self.set_variable(scope, variable, payload)
        {
            self.fail(
                ErrorContext::new(ErrorKind::VariableResolution, err.to_string()).at_node(node, id),
            );
            return;
        }
        self.leave(id, NodeInstanceState::Completed);
    }

    pub(crate) fn set_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Value,
    ) -> Result<(), VariableError> {
        self.instance.scopes.set(scope, name, value)?;
        self.instance.journal.push(JournalEntry::VariableSet {
            timestamp: Utc::now(),
            name: name.to_owned(),
        });
        Ok(())
    }

    /// Abort every other node instance of the terminating end's container.
    async fn terminate(&mut self, id: NodeInstanceId) {
        let container = self.instance.nodes.get(&id).and_then(|n| n.container);
        let siblings: Vec<NodeInstanceId> = self
            .instance
            .children_of(container)
            .into_iter()
            .filter(|s| *s != id)
            .collect();
        for sibling in siblings {
            self.cancel(sibling).await;
        }
        self.agenda.retain(|step| {
            !matches!(step, AgendaItem::Activate { container: c, .. } if *c == container)
        });
        self.instance.joins.retain(|(c, _), _| *c != container);
    }

    /// Cancel `root` and everything nested in it without following any
    /// connection. Cancellation failures are logged and never block.
    pub(crate) async fn cancel(&mut self, root: NodeInstanceId) {
        for id in self.instance.subtree(root) {
            let Some(mut node_instance) = self.instance.nodes.remove(&id) else {
                continue;
            };
            match node_instance.wait.clone() {
                NodeWait::WorkItem { id: work_item } => self.cancel_work_item(work_item).await,
                NodeWait::Correlation { key } => {
                    self.engine.correlations.remove(&key, self.instance.id, id);
                    if let CorrelationKey::Timer { handle } = &key
                        && let Err(err) = self.engine.timers().cancel(handle)
                    {
                        tracing::warn!(
                            instance_id = %self.instance.id,
                            timer = %handle,
                            error = %err,
                            "failed to cancel timer"
                        );
                    }
                }
                NodeWait::Children => {
                    self.instance.scopes.close(node_instance.scope);
                    self.instance.joins.retain(|(c, _), _| *c != Some(id));
                }
                NodeWait::Evaluating => {}
            }
            if node_instance.abort().is_ok() {
                self.instance.journal.push(JournalEntry::NodeAborted {
                    timestamp: Utc::now(),
                    node: node_instance.node.clone(),
                    node_instance: id,
                });
            }
            tracing::debug!(instance_id = %self.instance.id, node = %node_instance.node, "node cancelled");
        }
    }

    /// Cancel every node instance and move to ABORTED.
    pub(crate) async fn abort_instance(&mut self) {
        for top in self.instance.children_of(None) {
            self.cancel(top).await;
        }
        let orphans: Vec<NodeInstanceId> = self.instance.nodes.keys().copied().collect();
        for orphan in orphans {
            self.cancel(orphan).await;
        }
        self.agenda.clear();
        self.instance.deferred.clear();
        self.instance.joins.clear();
        match self.instance.transition(ProcessState::Aborted) {
            Ok(()) => tracing::info!(instance_id = %self.instance.id, "process instance aborted"),
            Err(err) => tracing::warn!(instance_id = %self.instance.id, error = %err, "abort rejected"),
        }
    }

    /// Move the instance to ERROR, keeping the failing node for recovery.
    pub(crate) fn fail(&mut self, context: ErrorContext) {
        tracing::error!(
            instance_id = %self.instance.id,
            kind = %context.kind,
            node = ?context.node.as_ref().map(NodeKey::as_str),
            error = %context.message,
            "process instance failed"
        );
        if let Err(err) = self.instance.transition(ProcessState::Error) {
            tracing::warn!(instance_id = %self.instance.id, error = %err, "cannot enter error state");
            return;
        }
        self.instance.error = Some(context);
    }

    fn complete_instance(&mut self) {
        if self.instance.transition(ProcessState::Completed).is_ok() {
            self.instance.joins.clear();
            tracing::info!(instance_id = %self.instance.id, "process instance completed");
        }
    }
}

//! Task dispatch and the work item outcome paths.

use std::sync::Arc;

use chrono::Utc;
use orrery_core::{NodeInstanceId, WorkItemId};
use orrery_definition::{NodeKind, ParameterSource, TaskNode};
use orrery_execution::{ErrorContext, ErrorKind, JournalEntry, NodeInstanceState, NodeWait};
use orrery_workitem::{
    DataMap, HandlerFault, RecoveryAction, WorkItem, WorkItemManager, WorkItemOutcome,
    resolve_strategy,
};
use serde_json::Value;

use crate::cascade::Run;
use crate::handle::WorkItemManagerHandle;
use crate::instance::WorkItemEntry;

/// Outcome reported through the manager while `execute` was still running.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Captured {
    Complete(DataMap),
    Abort,
}

impl Run<'_> {
    /// Resolve parameters, create the work item and hand it to its handler.
    pub(crate) async fn dispatch_task(&mut self, id: NodeInstanceId, task: &TaskNode) {
        let definition = Arc::clone(&self.instance.definition);
        let Some(node_instance) = self.instance.nodes.get(&id) else {
            return;
        };
        let node = node_instance.node.clone();
        let scope = node_instance.scope;

        let mut parameters = DataMap::new();
        let mut visible: Option<Value> = None;
        for (name, source) in &task.parameters {
            let value = match source {
                ParameterSource::Literal { value } => value.clone(),
                ParameterSource::Variable { name: variable } => {
                    match self.instance.scopes.resolve(scope, variable) {
                        Ok(value) => value.cloned().unwrap_or(Value::Null),
                        Err(err) => {
                            self.fail(
                                ErrorContext::new(ErrorKind::VariableResolution, err.to_string())
                                    .at_node(node, id),
                            );
                            return;
                        }
                    }
                }
                ParameterSource::Transformation(transformation) => {
                    let input = visible.get_or_insert_with(|| {
                        Value::Object(self.instance.scopes.visible(scope).into_iter().collect())
                    });
                    let applied = definition
                        .transformation(transformation)
                        .map(|compiled| compiled.apply(input));
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
                                    format!("parameter `{name}` has no compiled transformation"),
                                )
                                .at_node(node, id),
                            );
                            return;
                        }
                    }
                }
            };
            parameters.insert(name.clone(), value);
        }

        let mut item = WorkItem::new(task.task_type.clone(), self.instance.id, id, parameters);
        let work_item = item.id;
        self.engine.work_item_index.insert(work_item, self.instance.id);
        if let Some(node_instance) = self.instance.nodes.get_mut(&id) {
            node_instance.wait = NodeWait::WorkItem { id: work_item };
        }

        let handler = match self.engine.handlers.get(&task.task_type) {
            Ok(handler) => handler,
            Err(err) => {
                if let Err(transition) = item.fail() {
                    tracing::warn!(work_item_id = %work_item, error = %transition, "cannot fail work item");
                }
                self.instance.work_items.insert(
                    work_item,
                    WorkItemEntry {
                        item,
                        handler: None,
                    },
                );
                self.instance.journal.push(JournalEntry::WorkItemFailed {
                    timestamp: Utc::now(),
                    work_item,
                    error: err.to_string(),
                });
                self.fail(
                    ErrorContext::new(ErrorKind::Configuration, err.to_string())
                        .at_node(node, id)
                        .with_work_item(work_item),
                );
                return;
            }
        };

        self.instance.work_items.insert(
            work_item,
            WorkItemEntry {
                item,
                handler: Some(handler),
            },
        );
        self.instance.journal.push(JournalEntry::WorkItemDispatched {
            timestamp: Utc::now(),
            work_item,
            task_type: task.task_type.clone(),
            node_instance: id,
        });
        tracing::debug!(
            instance_id = %self.instance.id,
            node = %node,
            work_item_id = %work_item,
            task_type = %task.task_type,
            "work item dispatched"
        );
        self.execute(work_item, task).await;
    }

    /// Invoke the handler until it reports an outcome, pends, or the
    /// fault strategy gives up.
    async fn execute(&mut self, work_item: WorkItemId, task: &TaskNode) {
        let default_strategy = task.strategy.unwrap_or(self.engine.config.default_strategy);
        let retry = task
            .retry
            .clone()
            .unwrap_or_else(|| self.engine.config.retry.clone());
        let mut attempt: u32 = 0;

        loop {
            let Some(entry) = self.instance.work_items.get_mut(&work_item) else {
                return;
            };
            let Some(handler) = entry.handler.clone() else {
                return;
            };
            entry.item.attempts += 1;
            let item = entry.item.clone();

            self.engine.in_flight.insert(work_item, None);
            let manager: Arc<dyn WorkItemManager> =
                Arc::new(WorkItemManagerHandle::new(Arc::downgrade(self.engine)));
            let result = handler.execute(&item, manager).await;
            let captured = self
                .engine
                .in_flight
                .remove(&work_item)
                .and_then(|(_, captured)| captured);

            match (captured, result) {
                (Some(Captured::Complete(results)), _)
                | (None, Ok(WorkItemOutcome::Completed(results))) => {
                    self.complete_work_item(work_item, results);
                }
                (Some(Captured::Abort), _) | (None, Ok(WorkItemOutcome::Aborted)) => {
                    self.abort_work_item(work_item);
                }
                (None, Ok(WorkItemOutcome::Pending)) => {
                    tracing::debug!(
                        instance_id = %self.instance.id,
                        work_item_id = %work_item,
                        "work item pending external completion"
                    );
                }
                (None, Err(fault)) => {
                    match resolve_strategy(&fault, default_strategy, attempt, &retry) {
                        RecoveryAction::Complete(results) => {
                            tracing::warn!(
                                work_item_id = %work_item,
                                error = %fault,
                                "handler fault recovered by completing"
                            );
                            self.complete_work_item(work_item, results);
                        }
                        RecoveryAction::Abort => {
                            tracing::warn!(
                                work_item_id = %work_item,
                                error = %fault,
                                "handler fault recovered by aborting"
                            );
                            self.abort_work_item(work_item);
                        }
                        RecoveryAction::Retry { delay } => {
                            attempt += 1;
                            tracing::warn!(
                                work_item_id = %work_item,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %fault,
                                "retrying work item"
                            );
                            self.instance.journal.push(JournalEntry::WorkItemRetried {
                                timestamp: Utc::now(),
                                work_item,
                                attempt,
                                error: fault.message.clone(),
                            });
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            continue;
                        }
                        RecoveryAction::Rethrow { retries_exhausted } => {
                            self.fault_work_item(work_item, &fault, retries_exhausted);
                        }
                    }
                }
            }
            return;
        }
    }

    fn fault_work_item(&mut self, work_item: WorkItemId, fault: &HandlerFault, exhausted: bool) {
        let Some(entry) = self.instance.work_items.get_mut(&work_item) else {
            return;
        };
        if let Err(err) = entry.item.fail() {
            tracing::warn!(work_item_id = %work_item, error = %err, "cannot fail work item");
        }
        let node_instance = entry.item.node_instance;
        self.instance.journal.push(JournalEntry::WorkItemFailed {
            timestamp: Utc::now(),
            work_item,
            error: fault.message.clone(),
        });

        let kind = if exhausted {
            ErrorKind::RetryExhausted
        } else {
            ErrorKind::HandlerFault
        };
        let mut context = ErrorContext::new(kind, fault.message.clone()).with_work_item(work_item);
        if let Some(node) = self.instance.nodes.get(&node_instance) {
            context = context.at_node(node.node.clone(), node_instance);
        }
        self.fail(context);
    }

    /// Record results, map outputs and leave the task node.
    pub(crate) fn complete_work_item(&mut self, work_item: WorkItemId, results: DataMap) {
        let definition = Arc::clone(&self.instance.definition);
        let Some(entry) = self.instance.work_items.get_mut(&work_item) else {
            return;
        };
        if let Err(err) = entry.item.complete(results.clone()) {
            tracing::warn!(work_item_id = %work_item, error = %err, "work item completion ignored");
            return;
        }
        let id = entry.item.node_instance;
        self.instance.journal.push(JournalEntry::WorkItemCompleted {
            timestamp: Utc::now(),
            work_item,
        });
        tracing::debug!(instance_id = %self.instance.id, work_item_id = %work_item, "work item completed");

        let Some(node_instance) = self.instance.nodes.get_mut(&id) else {
            return;
        };
        node_instance.wait = NodeWait::Evaluating;
        let node = node_instance.node.clone();
        let scope = node_instance.scope;

        if let Some(NodeKind::Task(task)) = definition.node(node.as_str()).map(|n| &n.kind) {
            for mapping in &task.outputs {
                if let Some(value) = results.get(&mapping.from)
                    && let Err(err) = self.set_variable(scope, &mapping.to, value.clone())
                {
                    self.fail(
                        ErrorContext::new(ErrorKind::VariableResolution, err.to_string())
                            .at_node(node, id)
                            .with_work_item(work_item),
                    );
                    return;
                }
            }
        }
        self.leave(id, NodeInstanceState::Completed);
    }

    /// Abort the item and follow the task node's abort path.
    pub(crate) fn abort_work_item(&mut self, work_item: WorkItemId) {
        let Some(entry) = self.instance.work_items.get_mut(&work_item) else {
            return;
        };
        if let Err(err) = entry.item.abort() {
            tracing::warn!(work_item_id = %work_item, error = %err, "work item abort ignored");
            return;
        }
        let id = entry.item.node_instance;
        self.instance.journal.push(JournalEntry::WorkItemAborted {
            timestamp: Utc::now(),
            work_item,
        });
        tracing::debug!(instance_id = %self.instance.id, work_item_id = %work_item, "work item aborted");
        if let Some(node_instance) = self.instance.nodes.get_mut(&id) {
            node_instance.wait = NodeWait::Evaluating;
        }
        self.leave(id, NodeInstanceState::Aborted);
    }

    /// Abort a live work item during cancellation and let its handler
    /// release whatever it holds.
    pub(crate) async fn cancel_work_item(&mut self, work_item: WorkItemId) {
        let Some(entry) = self.instance.work_items.get_mut(&work_item) else {
            return;
        };
        if entry.item.state.is_terminal() {
            return;
        }
        if let Err(err) = entry.item.abort() {
            tracing::warn!(work_item_id = %work_item, error = %err, "cannot abort work item");
            return;
        }
        let item = entry.item.clone();
        let handler = entry.handler.clone();
        self.instance.journal.push(JournalEntry::WorkItemAborted {
            timestamp: Utc::now(),
            work_item,
        });
        if let Some(handler) = handler
            && let Err(fault) = handler.abort(&item).await
        {
            tracing::warn!(
                instance_id = %self.instance.id,
                work_item_id = %work_item,
                error = %fault,
                "handler failed to release aborted work item"
            );
        }
    }

    /// Drop the node instance that caused an ERROR so recovery can start
    /// elsewhere. Its work item is aborted without notifying the handler.
    pub(crate) fn discard_failed(&mut self, id: NodeInstanceId) {
        for nested in self.instance.subtree(id) {
            let Some(mut node_instance) = self.instance.nodes.remove(&nested) else {
                continue;
            };
            match node_instance.wait.clone() {
                NodeWait::WorkItem { id: work_item } => {
                    if let Some(entry) = self.instance.work_items.get_mut(&work_item)
                        && !entry.item.state.is_terminal()
                        && entry.item.abort().is_ok()
                    {
                        self.instance.journal.push(JournalEntry::WorkItemAborted {
                            timestamp: Utc::now(),
                            work_item,
                        });
                    }
                }
                NodeWait::Correlation { key } => {
                    self.engine.correlations.remove(&key, self.instance.id, nested);
                }
                NodeWait::Children => {
                    self.instance.scopes.close(node_instance.scope);
                }
                NodeWait::Evaluating => {}
            }
            if node_instance.abort().is_ok() {
                self.instance.journal.push(JournalEntry::NodeAborted {
                    timestamp: Utc::now(),
                    node: node_instance.node.clone(),
                    node_instance: nested,
                });
            }
        }
    }
}

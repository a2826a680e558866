//! The process engine.
//!
//! [`ProcessEngine`] is a cheap, cloneable handle over shared state. Each
//! instance sits behind its own async mutex: operations on one instance
//! are serialized, operations on different instances run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use orrery_core::{NodeKey, ProcessInstanceId, ProcessKey, TaskType, WorkItemId};
use orrery_definition::ProcessDefinition;
use orrery_execution::{
    AgendaItem, CorrelationKey, ExecutionError, InstanceSnapshot, InstanceSummary, JournalEntry,
    ProcessState, ScopeId, TimerHandle,
};
use orrery_workitem::{DataMap, HandlerRegistry, WorkItem, WorkItemHandler, WorkItemState};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::cascade::Run;
use crate::condition::{ConditionEvaluator, VariableConditionEvaluator};
use crate::config::EngineConfig;
use crate::correlation::CorrelationTable;
use crate::dispatch::Captured;
use crate::error::EngineError;
use crate::handle::WorkItemManagerHandle;
use crate::instance::ProcessInstance;
use crate::registered::RegisteredDefinition;
use crate::timer::{ManualTimerService, TimerError, TimerService};
use crate::transform::{PathTransformer, Transformer};

type InstanceCell = Arc<Mutex<ProcessInstance>>;

struct Collaborators {
    timers: Arc<dyn TimerService>,
    conditions: Arc<dyn ConditionEvaluator>,
    transformers: HashMap<String, Arc<dyn Transformer>>,
}

/// Result of offering an outcome reported through the manager.
pub(crate) enum Capture {
    /// Taken as the result of the running `execute` call.
    Recorded,
    /// Held until the run owning the item's instance is idle.
    Queued,
    Duplicate,
    NotInFlight(Captured),
}

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    definitions: DashMap<ProcessKey, Arc<RegisteredDefinition>>,
    pub(crate) handlers: HandlerRegistry,
    instances: DashMap<ProcessInstanceId, InstanceCell>,
    pub(crate) work_item_index: DashMap<WorkItemId, ProcessInstanceId>,
    pub(crate) in_flight: DashMap<WorkItemId, Option<Captured>>,
    /// Outcomes for instances whose lock is held by a running cascade.
    pub(crate) queued: DashMap<ProcessInstanceId, Vec<(WorkItemId, Captured)>>,
    pub(crate) correlations: CorrelationTable,
    collaborators: RwLock<Collaborators>,
}

impl EngineInner {
    pub(crate) fn timers(&self) -> Arc<dyn TimerService> {
        Arc::clone(&self.collaborators.read().timers)
    }

    pub(crate) fn conditions(&self) -> Arc<dyn ConditionEvaluator> {
        Arc::clone(&self.collaborators.read().conditions)
    }

    /// Record `outcome` if `execute` is running for `id`, or queue it when
    /// another cascade holds the item's instance.
    pub(crate) fn capture(&self, id: WorkItemId, outcome: Captured) -> Capture {
        if let Some(mut slot) = self.in_flight.get_mut(&id) {
            if slot.is_some() {
                return Capture::Duplicate;
            }
            *slot = Some(outcome);
            return Capture::Recorded;
        }
        let Some(instance_id) = self.work_item_index.get(&id).map(|entry| *entry.value()) else {
            return Capture::NotInFlight(outcome);
        };
        match self.queued.get_mut(&instance_id) {
            Some(queue) if queue.iter().any(|(queued, _)| *queued == id) => Capture::Duplicate,
            Some(mut queue) => {
                queue.push((id, outcome));
                Capture::Queued
            }
            None => Capture::NotInFlight(outcome),
        }
    }
}

/// Executes process definitions.
///
/// ```rust,ignore
/// let engine = ProcessEngine::new(EngineConfig::default());
/// engine.register_handler(TaskType::new("Human Task")?, Arc::new(MyHandler));
/// engine.register_definition(definition)?;
/// let summary = engine.start(&ProcessKey::new("orders")?, DataMap::new()).await?;
/// ```
#[derive(Clone)]
pub struct ProcessEngine {
    inner: Arc<EngineInner>,
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for ProcessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEngine")
            .field("definitions", &self.inner.definitions.len())
            .field("instances", &self.inner.instances.len())
            .field("handlers", &self.inner.handlers.len())
            .finish()
    }
}

impl ProcessEngine {
    /// Create an engine with the manual timer service, the variable
    /// condition evaluator and the `path` transformer.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let path: Arc<dyn Transformer> = Arc::new(PathTransformer);
        let collaborators = Collaborators {
            timers: Arc::new(ManualTimerService::new()),
            conditions: Arc::new(VariableConditionEvaluator),
            transformers: HashMap::from([(path.language().to_owned(), path)]),
        };
        Self {
            inner: Arc::new(EngineInner {
                config,
                definitions: DashMap::new(),
                handlers: HandlerRegistry::new(),
                instances: DashMap::new(),
                work_item_index: DashMap::new(),
                in_flight: DashMap::new(),
                queued: DashMap::new(),
                correlations: CorrelationTable::new(),
                collaborators: RwLock::new(collaborators),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    /// Use `timers` for timer waits started from now on.
    #[must_use]
    pub fn with_timer_service(self, timers: Arc<dyn TimerService>) -> Self {
        self.inner.collaborators.write().timers = timers;
        self
    }

    /// Use `conditions` to evaluate connection conditions.
    #[must_use]
    pub fn with_condition_evaluator(self, conditions: Arc<dyn ConditionEvaluator>) -> Self {
        self.inner.collaborators.write().conditions = conditions;
        self
    }

    /// Add a transformer for its language, replacing any previous one.
    /// Applies to definitions registered afterwards.
    #[must_use]
    pub fn with_transformer(self, transformer: Arc<dyn Transformer>) -> Self {
        let language = transformer.language().to_owned();
        self.inner
            .collaborators
            .write()
            .transformers
            .insert(language, transformer);
        self
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// A manager handle for reporting work item outcomes asynchronously.
    #[must_use]
    pub fn manager(&self) -> WorkItemManagerHandle {
        WorkItemManagerHandle::new(Arc::downgrade(&self.inner))
    }

    // ── Definitions and handlers ──────────────────────────────────────

    /// Validate `definition`, compile its transformations and make it
    /// startable. A later registration under the same key replaces it.
    pub fn register_definition(&self, definition: ProcessDefinition) -> Result<(), EngineError> {
        let transformers = self.inner.collaborators.read().transformers.clone();
        let registered = RegisteredDefinition::build(definition, &transformers)?;
        let key = registered.definition().id.clone();
        let replaced = self.inner.definitions.contains_key(&key);
        tracing::info!(
            process = %key,
            version = registered.definition().version,
            nodes = registered.graph().node_count(),
            transformations = registered.compiled_transformations(),
            cyclic = registered.graph().has_cycle(),
            replaced,
            "registered process definition"
        );
        self.inner.definitions.insert(key, Arc::new(registered));
        Ok(())
    }

    /// The registered definition under `key`.
    #[must_use]
    pub fn definition(&self, key: &ProcessKey) -> Option<Arc<RegisteredDefinition>> {
        self.inner.definitions.get(key).map(|d| Arc::clone(d.value()))
    }

    /// Keys of every registered definition, sorted.
    #[must_use]
    pub fn definitions(&self) -> Vec<ProcessKey> {
        let mut keys: Vec<ProcessKey> =
            self.inner.definitions.iter().map(|d| d.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Register `handler` for `task_type`. The last registration wins.
    pub fn register_handler(&self, task_type: TaskType, handler: Arc<dyn WorkItemHandler>) {
        self.inner.handlers.register(task_type, handler);
    }

    /// The handler registry.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.inner.handlers
    }

    // ── Instance lifecycle ────────────────────────────────────────────

    /// Start an instance of `process` and run it to its first settled
    /// point.
    ///
    /// `variables` override declared defaults. A rejected variable fails
    /// the call before any instance exists. A failure during the initial
    /// cascade does not: the returned summary shows the instance in ERROR.
    pub async fn start(
        &self,
        process: &ProcessKey,
        variables: DataMap,
    ) -> Result<InstanceSummary, EngineError> {
        let definition = self
            .definition(process)
            .ok_or_else(|| EngineError::DefinitionNotFound(process.clone()))?;
        let config = &self.inner.config;
        let mut instance =
            ProcessInstance::new(definition, config.strict_variables, config.journal_capacity);
        for (name, value) in variables {
            instance.scopes.set(ScopeId::ROOT, &name, value)?;
        }
        instance.journal.push(JournalEntry::InstanceStarted {
            timestamp: Utc::now(),
            process: process.clone(),
        });
        let id = instance.id;
        tracing::info!(instance_id = %id, process = %process, "process instance started");

        let cell: InstanceCell = Arc::new(Mutex::new(instance));
        let mut guard = cell.lock().await;
        self.inner.instances.insert(id, Arc::clone(&cell));
        let mut run = Run::new(&self.inner, &mut guard);
        run.start();
        run.settle().await;
        Ok(guard.summary())
    }

    /// Abort the instance, cancelling every active node and its work.
    ///
    /// Aborting a terminal instance is a no-op returning its summary.
    pub async fn abort(&self, instance_id: ProcessInstanceId) -> Result<InstanceSummary, EngineError> {
        let cell = self.cell(instance_id)?;
        let mut guard = cell.lock().await;
        if guard.state.is_terminal() {
            tracing::debug!(instance_id = %instance_id, state = %guard.state, "abort on terminal instance ignored");
            return Ok(guard.summary());
        }
        let mut run = Run::new(&self.inner, &mut guard);
        run.abort_instance().await;
        run.settle().await;
        Ok(guard.summary())
    }

    /// Suspend an ACTIVE instance. Signals, timers and work item outcomes
    /// are rejected until [`resume`](Self::resume).
    pub async fn suspend(&self, instance_id: ProcessInstanceId) -> Result<InstanceSummary, EngineError> {
        let cell = self.cell(instance_id)?;
        let mut guard = cell.lock().await;
        ensure_not_terminal(&guard)?;
        guard.transition(ProcessState::Suspended)?;
        tracing::info!(instance_id = %instance_id, "process instance suspended");
        Ok(guard.summary())
    }

    /// Resume a SUSPENDED instance.
    pub async fn resume(&self, instance_id: ProcessInstanceId) -> Result<InstanceSummary, EngineError> {
        let cell = self.cell(instance_id)?;
        let mut guard = cell.lock().await;
        ensure_not_terminal(&guard)?;
        if guard.state != ProcessState::Suspended {
            return Err(ExecutionError::invalid_transition(guard.state, ProcessState::Active).into());
        }
        guard.transition(ProcessState::Active)?;
        tracing::info!(instance_id = %instance_id, "process instance resumed");
        Ok(guard.summary())
    }

    /// Recover an instance in ERROR by activating `node`.
    ///
    /// The failing node instance is discarded (its work item is aborted
    /// without notifying the handler), activations left pending by the
    /// failure are restored, and the cascade continues from `node`. The
    /// target must be top level or share the failing node's container.
    pub async fn resume_from_node(
        &self,
        instance_id: ProcessInstanceId,
        node: &NodeKey,
    ) -> Result<InstanceSummary, EngineError> {
        let cell = self.cell(instance_id)?;
        let mut guard = cell.lock().await;
        ensure_not_terminal(&guard)?;
        if guard.state != ProcessState::Error {
            return Err(ExecutionError::invalid_transition(guard.state, ProcessState::Active).into());
        }

        let definition = Arc::clone(&guard.definition);
        let target = definition
            .node(node.as_str())
            .ok_or_else(|| EngineError::NodeNotFound(node.clone()))?;
        let failing = guard.error.as_ref().and_then(|e| e.node_instance);
        let failing_container = failing
            .and_then(|f| guard.nodes.get(&f))
            .and_then(|n| n.container);
        let container = match &target.container {
            None => None,
            Some(expected) => {
                let actual = failing_container.and_then(|c| guard.nodes.get(&c)).map(|n| &n.node);
                if actual != Some(expected) {
                    return Err(EngineError::ResumeTarget {
                        node: node.clone(),
                        reason: format!("node lives in `{expected}`, outside the failing node's container"),
                    });
                }
                failing_container
            }
        };

        guard.transition(ProcessState::Active)?;
        guard.error = None;
        tracing::info!(instance_id = %instance_id, node = %node, "resuming process instance from node");

        let mut run = Run::new(&self.inner, &mut guard);
        if let Some(failing) = failing {
            run.discard_failed(failing);
        }
        run.take_deferred();
        run.push(AgendaItem::CheckContainer {
            container: failing_container,
        });
        run.schedule(node.clone(), container);
        run.settle().await;
        Ok(guard.summary())
    }

    // ── External events ───────────────────────────────────────────────

    /// Deliver `key` to one waiting node instance of `instance_id`.
    ///
    /// When nothing in the instance waits on `key` the signal is dropped
    /// with a warning and the summary is returned unchanged.
    pub async fn signal(
        &self,
        instance_id: ProcessInstanceId,
        key: &CorrelationKey,
        payload: Value,
    ) -> Result<InstanceSummary, EngineError> {
        let cell = self.cell(instance_id)?;
        let mut guard = cell.lock().await;
        ensure_active(&guard)?;
        let Some(node_instance) = self.inner.correlations.take(key, instance_id) else {
            tracing::warn!(instance_id = %instance_id, key = %key, "no node instance is waiting, signal dropped");
            return Ok(guard.summary());
        };
        let mut run = Run::new(&self.inner, &mut guard);
        run.resolve_wait(node_instance, key, payload);
        run.settle().await;
        Ok(guard.summary())
    }

    /// Deliver `key` to every node instance waiting on it, across all
    /// instances.
    ///
    /// Each instance resolves all of its waiters under one lock and then
    /// settles once. Instances that reject the delivery are skipped with a
    /// warning and keep their registrations.
    pub async fn broadcast(
        &self,
        key: &CorrelationKey,
        payload: Value,
    ) -> Result<Vec<InstanceSummary>, EngineError> {
        let mut summaries = Vec::new();
        for instance_id in self.inner.correlations.instances_waiting(key) {
            match self.deliver_all(instance_id, key, payload.clone()).await {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    tracing::warn!(instance_id = %instance_id, key = %key, error = %err, "broadcast skipped instance");
                }
            }
        }
        Ok(summaries)
    }

    async fn deliver_all(
        &self,
        instance_id: ProcessInstanceId,
        key: &CorrelationKey,
        payload: Value,
    ) -> Result<InstanceSummary, EngineError> {
        let cell = self.cell(instance_id)?;
        let mut guard = cell.lock().await;
        ensure_active(&guard)?;
        let mut run = Run::new(&self.inner, &mut guard);
        let mut resolved = 0usize;
        while run.instance.state == ProcessState::Active {
            let Some(node_instance) = self.inner.correlations.take(key, instance_id) else {
                break;
            };
            run.resolve_wait(node_instance, key, payload.clone());
            resolved += 1;
        }
        tracing::debug!(instance_id = %instance_id, key = %key, resolved, "broadcast delivered");
        run.settle().await;
        Ok(guard.summary())
    }

    /// Deliver a due timer.
    ///
    /// Returns `Ok(None)` when nothing waits on the handle any more or the
    /// waiting instance has finished. A SUSPENDED or ERROR instance rejects
    /// the delivery and keeps its registration. Every other outcome releases
    /// the handle from the configured timer service.
    pub async fn fire_timer(&self, handle: &TimerHandle) -> Result<Option<InstanceSummary>, EngineError> {
        let key = CorrelationKey::timer(handle.clone());
        let Some(instance_id) = self.inner.correlations.instances_waiting(&key).into_iter().next() else {
            tracing::warn!(timer = %handle, "nothing waits on timer, delivery dropped");
            self.release_timer(handle);
            return Ok(None);
        };
        let cell = match self.cell(instance_id) {
            Ok(cell) => cell,
            Err(_) => {
                tracing::warn!(timer = %handle, instance_id = %instance_id, "timer target unloaded, delivery dropped");
                self.inner.correlations.take(&key, instance_id);
                self.release_timer(handle);
                return Ok(None);
            }
        };
        let mut guard = cell.lock().await;
        if guard.state.is_terminal() {
            tracing::warn!(timer = %handle, instance_id = %instance_id, "timer target finished, delivery dropped");
            self.inner.correlations.take(&key, instance_id);
            self.release_timer(handle);
            return Ok(None);
        }
        ensure_active(&guard)?;
        let Some(node_instance) = self.inner.correlations.take(&key, instance_id) else {
            self.release_timer(handle);
            return Ok(None);
        };
        tracing::debug!(timer = %handle, instance_id = %instance_id, "timer fired");
        self.release_timer(handle);
        let mut run = Run::new(&self.inner, &mut guard);
        run.resolve_wait(node_instance, &key, Value::Null);
        run.settle().await;
        Ok(Some(guard.summary()))
    }

    fn release_timer(&self, handle: &TimerHandle) {
        match self.inner.timers().cancel(handle) {
            Ok(()) | Err(TimerError::UnknownTimer(_)) => {}
            Err(err) => {
                tracing::warn!(timer = %handle, error = %err, "timer service kept fired timer");
            }
        }
    }

    /// Complete a pending work item with `results`.
    ///
    /// A finished instance is reported as such before the item's own state.
    /// Handlers reporting from inside `execute` go through
    /// [`manager`](Self::manager) instead, which queues outcomes for an
    /// instance whose cascade is still running.
    pub async fn complete_work_item(
        &self,
        id: WorkItemId,
        results: DataMap,
    ) -> Result<InstanceSummary, EngineError> {
        self.apply_outcome(id, Captured::Complete(results)).await
    }

    /// Abort a pending work item, following its node's abort path.
    pub async fn abort_work_item(&self, id: WorkItemId) -> Result<InstanceSummary, EngineError> {
        self.apply_outcome(id, Captured::Abort).await
    }

    pub(crate) async fn apply_outcome(
        &self,
        id: WorkItemId,
        outcome: Captured,
    ) -> Result<InstanceSummary, EngineError> {
        let instance_id = self
            .inner
            .work_item_index
            .get(&id)
            .map(|entry| *entry.value())
            .ok_or(EngineError::WorkItemNotFound(id))?;
        let cell = self.cell(instance_id)?;
        let mut guard = cell.lock().await;
        ensure_not_terminal(&guard)?;
        let state = guard
            .work_items
            .get(&id)
            .map(|entry| entry.item.state)
            .ok_or(EngineError::WorkItemNotFound(id))?;
        if state.is_terminal() {
            return Err(EngineError::WorkItemTerminal {
                work_item_id: id,
                state,
            });
        }
        ensure_active(&guard)?;

        let mut run = Run::new(&self.inner, &mut guard);
        match outcome {
            Captured::Complete(results) => run.complete_work_item(id, results),
            Captured::Abort => run.abort_work_item(id),
        }
        run.settle().await;
        Ok(guard.summary())
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Ids of every loaded instance.
    #[must_use]
    pub fn instances(&self) -> Vec<ProcessInstanceId> {
        let mut ids: Vec<ProcessInstanceId> = self.inner.instances.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Current summary of an instance.
    pub async fn summary(&self, instance_id: ProcessInstanceId) -> Result<InstanceSummary, EngineError> {
        let cell = self.cell(instance_id)?;
        let guard = cell.lock().await;
        Ok(guard.summary())
    }

    /// Root-scope variables of an instance.
    pub async fn variables(&self, instance_id: ProcessInstanceId) -> Result<DataMap, EngineError> {
        let cell = self.cell(instance_id)?;
        let guard = cell.lock().await;
        Ok(guard.scopes.root_values())
    }

    /// A root-scope variable of an instance.
    pub async fn variable(
        &self,
        instance_id: ProcessInstanceId,
        name: &str,
    ) -> Result<Option<Value>, EngineError> {
        let cell = self.cell(instance_id)?;
        let guard = cell.lock().await;
        Ok(guard.scopes.get(ScopeId::ROOT, name).cloned())
    }

    /// A work item of any loaded instance.
    pub async fn work_item(&self, id: WorkItemId) -> Result<WorkItem, EngineError> {
        let instance_id = self
            .inner
            .work_item_index
            .get(&id)
            .map(|entry| *entry.value())
            .ok_or(EngineError::WorkItemNotFound(id))?;
        let cell = self.cell(instance_id)?;
        let guard = cell.lock().await;
        guard
            .work_items
            .get(&id)
            .map(|entry| entry.item.clone())
            .ok_or(EngineError::WorkItemNotFound(id))
    }

    /// Work items of an instance that still await an outcome.
    pub async fn pending_work_items(
        &self,
        instance_id: ProcessInstanceId,
    ) -> Result<Vec<WorkItem>, EngineError> {
        let cell = self.cell(instance_id)?;
        let guard = cell.lock().await;
        let mut items: Vec<WorkItem> = guard
            .work_items
            .values()
            .filter(|entry| entry.item.state == WorkItemState::Active)
            .map(|entry| entry.item.clone())
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    /// Journal entries of an instance, oldest first.
    pub async fn journal(&self, instance_id: ProcessInstanceId) -> Result<Vec<JournalEntry>, EngineError> {
        let cell = self.cell(instance_id)?;
        let guard = cell.lock().await;
        Ok(guard.journal.to_vec())
    }

    // ── Persistence ───────────────────────────────────────────────────

    /// Capture the full state of an instance.
    pub async fn snapshot(&self, instance_id: ProcessInstanceId) -> Result<InstanceSnapshot, EngineError> {
        let cell = self.cell(instance_id)?;
        let guard = cell.lock().await;
        Ok(guard.snapshot())
    }

    /// Load an instance from a snapshot.
    ///
    /// The definition must be registered. Pending work items are not
    /// re-dispatched: they wait for [`complete_work_item`](Self::complete_work_item)
    /// or [`abort_work_item`](Self::abort_work_item).
    pub async fn restore(&self, snapshot: InstanceSnapshot) -> Result<ProcessInstanceId, EngineError> {
        let definition = self
            .definition(&snapshot.definition_id)
            .ok_or_else(|| EngineError::DefinitionNotFound(snapshot.definition_id.clone()))?;
        let id = snapshot.instance_id;
        if self.inner.instances.contains_key(&id) {
            return Err(EngineError::Snapshot(format!("instance {id} is already loaded")));
        }
        let instance = ProcessInstance::from_snapshot(snapshot, definition, &self.inner.handlers)
            .map_err(|err| EngineError::Snapshot(err.to_string()))?;

        for work_item in instance.work_items.keys() {
            self.inner.work_item_index.insert(*work_item, id);
        }
        for node_instance in instance.nodes.values() {
            if let Some(key) = node_instance.correlation() {
                self.inner
                    .correlations
                    .register(key.clone(), id, node_instance.id);
            }
        }
        tracing::info!(instance_id = %id, state = %instance.state, "process instance restored");
        self.inner.instances.insert(id, Arc::new(Mutex::new(instance)));
        Ok(id)
    }

    /// Unload a finished instance, returning its final snapshot.
    pub async fn archive(&self, instance_id: ProcessInstanceId) -> Result<InstanceSnapshot, EngineError> {
        let cell = self.cell(instance_id)?;
        let snapshot = {
            let guard = cell.lock().await;
            if !guard.state.is_terminal() {
                return Err(EngineError::InstanceNotTerminal {
                    instance_id,
                    state: guard.state,
                });
            }
            guard.snapshot()
        };
        self.inner.instances.remove(&instance_id);
        for item in &snapshot.work_items {
            self.inner.work_item_index.remove(&item.id);
        }
        tracing::info!(instance_id = %instance_id, state = %snapshot.state, "process instance archived");
        Ok(snapshot)
    }

    fn cell(&self, instance_id: ProcessInstanceId) -> Result<InstanceCell, EngineError> {
        self.inner
            .instances
            .get(&instance_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::InstanceNotFound(instance_id))
    }
}

fn ensure_not_terminal(instance: &ProcessInstance) -> Result<(), EngineError> {
    if instance.state.is_terminal() {
        return Err(EngineError::InstanceTerminal {
            instance_id: instance.id,
            state: instance.state,
        });
    }
    Ok(())
}

fn ensure_active(instance: &ProcessInstance) -> Result<(), EngineError> {
    ensure_not_terminal(instance)?;
    if instance.state != ProcessState::Active {
        return Err(EngineError::InstanceNotActive {
            instance_id: instance.id,
            state: instance.state,
        });
    }
    Ok(())
}

//! Handler registry for looking up handlers by task type.

use std::sync::Arc;

use dashmap::DashMap;
use orrery_core::TaskType;

use crate::error::RegistryError;
use crate::handler::WorkItemHandler;

/// Thread-safe registry of work item handlers.
///
/// Owned by the engine and shared by reference; concurrent lookups never
/// block each other.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<TaskType, Arc<dyn WorkItemHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `task_type`.
    ///
    /// If a handler is already registered for the key, it is replaced.
    pub fn register(&self, task_type: TaskType, handler: Arc<dyn WorkItemHandler>) {
        let replaced = self.handlers.insert(task_type.clone(), handler).is_some();
        tracing::info!(task_type = %task_type, replaced, "registered work item handler");
    }

    /// Look up the handler for `task_type`.
    pub fn get(&self, task_type: &TaskType) -> Result<Arc<dyn WorkItemHandler>, RegistryError> {
        self.handlers
            .get(task_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::HandlerNotFound(task_type.clone()))
    }

    /// Check if a handler is registered for `task_type`.
    #[must_use]
    pub fn contains(&self, task_type: &TaskType) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Remove a handler. Returns the removed handler, if any.
    pub fn remove(&self, task_type: &TaskType) -> Option<Arc<dyn WorkItemHandler>> {
        self.handlers.remove(task_type).map(|(_, v)| v)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// All registered task types.
    #[must_use]
    pub fn task_types(&self) -> Vec<TaskType> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("task_types", &self.task_types())
            .finish()
    }
}

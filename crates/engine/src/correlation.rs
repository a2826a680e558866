//! Engine-wide table of pending waits.

use std::collections::{HashMap, VecDeque};

use orrery_core::{NodeInstanceId, ProcessInstanceId};
use orrery_execution::CorrelationKey;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Waiter {
    instance: ProcessInstanceId,
    node_instance: NodeInstanceId,
}

/// Maps correlation keys to the node instances awaiting them.
///
/// Within one instance, waiters on the same key resolve oldest first, one
/// per delivery. Across instances every waiter resolves independently.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    waits: Mutex<HashMap<CorrelationKey, VecDeque<Waiter>>>,
}

impl CorrelationTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node_instance` of `instance` as waiting on `key`.
    pub fn register(
        &self,
        key: CorrelationKey,
        instance: ProcessInstanceId,
        node_instance: NodeInstanceId,
    ) {
        self.waits.lock().entry(key).or_default().push_back(Waiter {
            instance,
            node_instance,
        });
    }

    /// Remove and return the oldest waiter of `instance` on `key`.
    pub fn take(
        &self,
        key: &CorrelationKey,
        instance: ProcessInstanceId,
    ) -> Option<NodeInstanceId> {
        let mut waits = self.waits.lock();
        let queue = waits.get_mut(key)?;
        let position = queue.iter().position(|w| w.instance == instance)?;
        let waiter = queue.remove(position);
        if queue.is_empty() {
            waits.remove(key);
        }
        waiter.map(|w| w.node_instance)
    }

    /// Remove a specific registration. Returns `true` if it existed.
    pub fn remove(
        &self,
        key: &CorrelationKey,
        instance: ProcessInstanceId,
        node_instance: NodeInstanceId,
    ) -> bool {
        let mut waits = self.waits.lock();
        let Some(queue) = waits.get_mut(key) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|w| !(w.instance == instance && w.node_instance == node_instance));
        let removed = queue.len() != before;
        if queue.is_empty() {
            waits.remove(key);
        }
        removed
    }

    /// Distinct instances waiting on `key`, in registration order.
    #[must_use]
    pub fn instances_waiting(&self, key: &CorrelationKey) -> Vec<ProcessInstanceId> {
        let waits = self.waits.lock();
        let mut found: Vec<ProcessInstanceId> = Vec::new();
        for waiter in waits.get(key).into_iter().flatten() {
            if !found.contains(&waiter.instance) {
                found.push(waiter.instance);
            }
        }
        found
    }

    /// Total number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waits.lock().values().map(VecDeque::len).sum()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waits.lock().is_empty()
    }
}

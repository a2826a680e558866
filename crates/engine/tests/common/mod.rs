//! Handlers and helpers shared by the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use orrery_core::{ProcessKey, TaskType, WorkItemId};
use orrery_engine::{EngineConfig, ProcessEngine};
use orrery_execution::JournalEntry;
use orrery_workitem::{
    DataMap, HandlerFault, WorkItem, WorkItemHandler, WorkItemManager, WorkItemOutcome,
};
use parking_lot::Mutex;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn process(key: &str) -> ProcessKey {
    ProcessKey::new(key).unwrap()
}

pub fn task_type(name: &str) -> TaskType {
    TaskType::new(name).unwrap()
}

pub fn data<const N: usize>(pairs: [(&str, Value); N]) -> DataMap {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}

pub fn engine() -> ProcessEngine {
    ProcessEngine::new(EngineConfig::default())
}

/// Node keys entered, in journal order.
pub fn entered(journal: &[JournalEntry]) -> Vec<String> {
    journal
        .iter()
        .filter_map(|e| match e {
            JournalEntry::NodeEntered { node, .. } => Some(node.to_string()),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Completes every item with fixed results.
#[derive(Default)]
pub struct CompletingHandler {
    pub results: DataMap,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<WorkItem>>,
}

impl CompletingHandler {
    pub fn with_results(results: DataMap) -> Arc<Self> {
        Arc::new(Self {
            results,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkItemHandler for CompletingHandler {
    async fn execute(
        &self,
        item: &WorkItem,
        _manager: Arc<dyn WorkItemManager>,
    ) -> Result<WorkItemOutcome, HandlerFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(item.clone());
        Ok(WorkItemOutcome::Completed(self.results.clone()))
    }
}

/// Faults on every call with a clone of `fault`.
pub struct FaultingHandler {
    pub fault: HandlerFault,
    pub calls: AtomicUsize,
}

impl FaultingHandler {
    pub fn new(fault: HandlerFault) -> Arc<Self> {
        Arc::new(Self {
            fault,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkItemHandler for FaultingHandler {
    async fn execute(
        &self,
        _item: &WorkItem,
        _manager: Arc<dyn WorkItemManager>,
    ) -> Result<WorkItemOutcome, HandlerFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.fault.clone())
    }
}

/// Faults with RETRY `failures` times, then completes with `results`.
pub struct FlakyHandler {
    pub failures: usize,
    pub results: DataMap,
    pub calls: AtomicUsize,
}

impl FlakyHandler {
    pub fn new(failures: usize, results: DataMap) -> Arc<Self> {
        Arc::new(Self {
            failures,
            results,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkItemHandler for FlakyHandler {
    async fn execute(
        &self,
        _item: &WorkItem,
        _manager: Arc<dyn WorkItemManager>,
    ) -> Result<WorkItemOutcome, HandlerFault> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(HandlerFault::retry(format!("transient failure {call}")));
        }
        Ok(WorkItemOutcome::Completed(self.results.clone()))
    }
}

/// Leaves every item pending and records abort notifications.
#[derive(Default)]
pub struct PendingHandler {
    pub items: Mutex<Vec<WorkItem>>,
    pub aborted: Mutex<Vec<WorkItemId>>,
}

impl PendingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last(&self) -> WorkItem {
        self.items.lock().last().cloned().unwrap()
    }

    pub fn aborted(&self) -> Vec<WorkItemId> {
        self.aborted.lock().clone()
    }
}

#[async_trait]
impl WorkItemHandler for PendingHandler {
    async fn execute(
        &self,
        item: &WorkItem,
        _manager: Arc<dyn WorkItemManager>,
    ) -> Result<WorkItemOutcome, HandlerFault> {
        self.items.lock().push(item.clone());
        Ok(WorkItemOutcome::Pending)
    }

    async fn abort(&self, item: &WorkItem) -> Result<(), HandlerFault> {
        self.aborted.lock().push(item.id);
        Ok(())
    }
}

/// Reports its outcome through the manager from inside `execute`, then
/// returns `Pending`.
pub struct CallbackHandler {
    pub results: DataMap,
    pub report_twice: bool,
    pub second_report: Mutex<Option<Result<(), orrery_workitem::ManagerError>>>,
}

impl CallbackHandler {
    pub fn new(results: DataMap) -> Arc<Self> {
        Arc::new(Self {
            results,
            report_twice: false,
            second_report: Mutex::new(None),
        })
    }

    pub fn reporting_twice(results: DataMap) -> Arc<Self> {
        Arc::new(Self {
            results,
            report_twice: true,
            second_report: Mutex::new(None),
        })
    }
}

#[async_trait]
impl WorkItemHandler for CallbackHandler {
    async fn execute(
        &self,
        item: &WorkItem,
        manager: Arc<dyn WorkItemManager>,
    ) -> Result<WorkItemOutcome, HandlerFault> {
        manager
            .complete_work_item(item.id, self.results.clone())
            .await
            .map_err(|e| HandlerFault::new(e.to_string()))?;
        if self.report_twice {
            let second = manager.abort_work_item(item.id).await;
            *self.second_report.lock() = Some(second);
        }
        Ok(WorkItemOutcome::Pending)
    }
}

/// Completes the newest item held by `target` through the manager from
/// inside its own `execute`, then completes itself.
pub struct RelayHandler {
    pub target: Arc<PendingHandler>,
    pub results: DataMap,
    pub report_twice: bool,
    pub report: Mutex<Option<Result<(), orrery_workitem::ManagerError>>>,
    pub second_report: Mutex<Option<Result<(), orrery_workitem::ManagerError>>>,
}

impl RelayHandler {
    pub fn new(target: Arc<PendingHandler>, results: DataMap) -> Arc<Self> {
        Arc::new(Self {
            target,
            results,
            report_twice: false,
            report: Mutex::new(None),
            second_report: Mutex::new(None),
        })
    }

    pub fn reporting_twice(target: Arc<PendingHandler>, results: DataMap) -> Arc<Self> {
        Arc::new(Self {
            target,
            results,
            report_twice: true,
            report: Mutex::new(None),
            second_report: Mutex::new(None),
        })
    }
}

#[async_trait]
impl WorkItemHandler for RelayHandler {
    async fn execute(
        &self,
        _item: &WorkItem,
        manager: Arc<dyn WorkItemManager>,
    ) -> Result<WorkItemOutcome, HandlerFault> {
        let held = self.target.last().id;
        let first = manager.complete_work_item(held, self.results.clone()).await;
        *self.report.lock() = Some(first);
        if self.report_twice {
            let second = manager.abort_work_item(held).await;
            *self.second_report.lock() = Some(second);
        }
        Ok(WorkItemOutcome::Completed(DataMap::new()))
    }
}

//! Handler capability and the callbacks handed to it.

use std::sync::Arc;

use async_trait::async_trait;
use orrery_core::WorkItemId;

use crate::error::ManagerError;
use crate::fault::HandlerFault;
use crate::item::{DataMap, WorkItem};

/// What `execute` reports when it returns without faulting.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItemOutcome {
    /// Work finished synchronously with these results.
    Completed(DataMap),
    /// The handler aborted the work itself.
    Aborted,
    /// Work continues elsewhere; an outcome arrives later through the manager.
    Pending,
}

/// Callbacks a handler uses to report an outcome, during `execute` or later.
///
/// Calls made while `execute` is still running are recorded and applied by
/// the engine once `execute` returns; they take precedence over the
/// returned [`WorkItemOutcome`].
#[async_trait]
pub trait WorkItemManager: Send + Sync {
    /// Complete the work item with `results`.
    async fn complete_work_item(&self, id: WorkItemId, results: DataMap)
    -> Result<(), ManagerError>;

    /// Abort the work item.
    async fn abort_work_item(&self, id: WorkItemId) -> Result<(), ManagerError>;
}

/// Pluggable executor for one task type.
///
/// Stored in the [`HandlerRegistry`](crate::HandlerRegistry) as
/// `Arc<dyn WorkItemHandler>`. The handler that first executes a work item
/// serves it for its whole lifetime, including retries and abort notification.
#[async_trait]
pub trait WorkItemHandler: Send + Sync {
    /// Execute the work item.
    ///
    /// Returning [`WorkItemOutcome::Pending`] leaves the node waiting; keep
    /// `manager` to report the outcome later.
    async fn execute(
        &self,
        item: &WorkItem,
        manager: Arc<dyn WorkItemManager>,
    ) -> Result<WorkItemOutcome, HandlerFault>;

    /// Release external resources held for a work item that is being cancelled.
    async fn abort(&self, item: &WorkItem) -> Result<(), HandlerFault> {
        let _ = item;
        Ok(())
    }
}

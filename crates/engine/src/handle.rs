//! The manager handle given to work item handlers.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use orrery_core::WorkItemId;
use orrery_workitem::{DataMap, ManagerError, WorkItemManager};

use crate::dispatch::Captured;
use crate::engine::{Capture, EngineInner, ProcessEngine};

/// Lets a handler report an outcome for its work item, either while
/// `execute` is still running or any time later.
///
/// An outcome for another item of an instance whose cascade is running is
/// queued and applied before that cascade settles.
///
/// The handle holds a weak reference; once the engine is dropped every
/// call fails with [`ManagerError::EngineGone`].
#[derive(Clone)]
pub struct WorkItemManagerHandle {
    engine: Weak<EngineInner>,
}

impl WorkItemManagerHandle {
    pub(crate) fn new(engine: Weak<EngineInner>) -> Self {
        Self { engine }
    }

    async fn report(&self, id: WorkItemId, outcome: Captured) -> Result<(), ManagerError> {
        let engine: Arc<EngineInner> = self.engine.upgrade().ok_or(ManagerError::EngineGone)?;
        match engine.capture(id, outcome) {
            Capture::Recorded | Capture::Queued => Ok(()),
            Capture::Duplicate => Err(ManagerError::Rejected(format!(
                "an outcome for work item {id} was already reported"
            ))),
            Capture::NotInFlight(outcome) => ProcessEngine::from_inner(engine)
                .apply_outcome(id, outcome)
                .await
                .map(drop)
                .map_err(ManagerError::from),
        }
    }
}

impl std::fmt::Debug for WorkItemManagerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItemManagerHandle")
            .field("engine_alive", &(self.engine.strong_count() > 0))
            .finish()
    }
}

#[async_trait]
impl WorkItemManager for WorkItemManagerHandle {
    async fn complete_work_item(&self, id: WorkItemId, results: DataMap) -> Result<(), ManagerError> {
        self.report(id, Captured::Complete(results)).await
    }

    async fn abort_work_item(&self, id: WorkItemId) -> Result<(), ManagerError> {
        self.report(id, Captured::Abort).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_engine_is_reported() {
        let handle = {
            let engine = ProcessEngine::default();
            engine.manager()
        };
        assert_eq!(
            handle.complete_work_item(WorkItemId::v4(), DataMap::new()).await,
            Err(ManagerError::EngineGone)
        );
    }

    #[tokio::test]
    async fn unknown_work_item_is_rejected() {
        let engine = ProcessEngine::default();
        let id = WorkItemId::v4();
        assert_eq!(
            engine.manager().abort_work_item(id).await,
            Err(ManagerError::UnknownWorkItem(id))
        );
    }
}

//! Timer service collaborator.
//!
//! The engine never manages wall-clock scheduling itself. A timer wait asks
//! the [`TimerService`] for a handle; when the timer is due the host delivers
//! it with [`ProcessEngine::fire_timer`](crate::ProcessEngine::fire_timer).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use orrery_core::{NodeInstanceId, ProcessInstanceId};
use orrery_execution::{InstanceSummary, TimerHandle};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::engine::ProcessEngine;

/// Timer service failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// The expression is not understood by the service.
    #[error("invalid timer expression `{0}`")]
    InvalidExpression(String),

    /// The handle is not (or no longer) scheduled.
    #[error("unknown timer {0}")]
    UnknownTimer(TimerHandle),

    /// The service refused the request.
    #[error("timer service rejected request: {0}")]
    Rejected(String),
}

/// Who a timer is scheduled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTarget {
    /// The instance.
    pub instance: ProcessInstanceId,
    /// The waiting node instance.
    pub node_instance: NodeInstanceId,
}

/// Schedules and cancels timers on behalf of the engine.
pub trait TimerService: Send + Sync {
    /// Schedule a timer for `expression` and return its handle.
    fn schedule(&self, expression: &str, target: TimerTarget) -> Result<TimerHandle, TimerError>;

    /// Cancel a scheduled timer.
    fn cancel(&self, handle: &TimerHandle) -> Result<(), TimerError>;
}

/// A timer recorded by [`ManualTimerService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTimer {
    /// Expression as authored on the node.
    pub expression: String,
    /// Who is waiting.
    pub target: TimerTarget,
}

/// In-memory timer service whose timers fire only when told to.
///
/// Suitable for tests and for hosts that drive timers from their own
/// scheduler. Handles are random, so timers scheduled by separate services
/// never collide once their instances share an engine.
#[derive(Debug, Default)]
pub struct ManualTimerService {
    next: AtomicU64,
    scheduled: Mutex<HashMap<TimerHandle, (u64, ScheduledTimer)>>,
}

impl ManualTimerService {
    /// Create an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers currently scheduled, oldest first.
    #[must_use]
    pub fn scheduled(&self) -> Vec<(TimerHandle, ScheduledTimer)> {
        let mut timers: Vec<(u64, TimerHandle, ScheduledTimer)> = self
            .scheduled
            .lock()
            .iter()
            .map(|(h, (seq, t))| (*seq, h.clone(), t.clone()))
            .collect();
        timers.sort_by_key(|(seq, _, _)| *seq);
        timers.into_iter().map(|(_, h, t)| (h, t)).collect()
    }

    /// Number of scheduled timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scheduled.lock().len()
    }

    /// Whether no timer is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scheduled.lock().is_empty()
    }

    /// Fire one timer now.
    ///
    /// Returns `Ok(None)` when the handle is not scheduled or the engine
    /// dropped the delivery. A rejected delivery leaves the timer scheduled.
    pub async fn fire(
        &self,
        engine: &ProcessEngine,
        handle: &TimerHandle,
    ) -> Result<Option<InstanceSummary>, crate::EngineError> {
        if !self.scheduled.lock().contains_key(handle) {
            return Ok(None);
        }
        let summary = engine.fire_timer(handle).await?;
        self.scheduled.lock().remove(handle);
        Ok(summary)
    }

    /// Fire every scheduled timer, oldest first.
    pub async fn fire_all(&self, engine: &ProcessEngine) -> Vec<InstanceSummary> {
        let due: Vec<TimerHandle> = self.scheduled().into_iter().map(|(h, _)| h).collect();
        let mut summaries = Vec::with_capacity(due.len());
        for handle in due {
            match self.fire(engine, &handle).await {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(err) => tracing::warn!(timer = %handle, error = %err, "timer delivery rejected"),
            }
        }
        summaries
    }
}

impl TimerService for ManualTimerService {
    fn schedule(&self, expression: &str, target: TimerTarget) -> Result<TimerHandle, TimerError> {
        if expression.trim().is_empty() {
            return Err(TimerError::InvalidExpression(expression.to_owned()));
        }
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        let handle = TimerHandle::new(format!("timer-{}", Uuid::new_v4()));
        self.scheduled.lock().insert(
            handle.clone(),
            (
                seq,
                ScheduledTimer {
                    expression: expression.to_owned(),
                    target,
                },
            ),
        );
        Ok(handle)
    }

    fn cancel(&self, handle: &TimerHandle) -> Result<(), TimerError> {
        self.scheduled
            .lock()
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| TimerError::UnknownTimer(handle.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TimerTarget {
        TimerTarget {
            instance: ProcessInstanceId::v4(),
            node_instance: NodeInstanceId::v4(),
        }
    }

    #[test]
    fn schedule_and_cancel() {
        let timers = ManualTimerService::new();
        let a = timers.schedule("PT5M", target()).unwrap();
        let b = timers.schedule("PT1H", target()).unwrap();
        assert_ne!(a, b);
        assert_eq!(timers.len(), 2);

        timers.cancel(&a).unwrap();
        assert_eq!(timers.scheduled()[0].0, b);
        assert_eq!(timers.cancel(&a), Err(TimerError::UnknownTimer(a)));
    }

    #[test]
    fn handles_are_unique_across_services() {
        let first = ManualTimerService::new();
        let second = ManualTimerService::new();
        let a = first.schedule("PT5M", target()).unwrap();
        let b = second.schedule("PT5M", target()).unwrap();
        assert_ne!(a, b);
        assert!(second.cancel(&a).is_err());
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn scheduled_keeps_insertion_order() {
        let timers = ManualTimerService::new();
        let handles: Vec<TimerHandle> = (0..5)
            .map(|_| timers.schedule("PT1M", target()).unwrap())
            .collect();
        let listed: Vec<TimerHandle> = timers.scheduled().into_iter().map(|(h, _)| h).collect();
        assert_eq!(listed, handles);
    }

    #[test]
    fn rejects_blank_expression() {
        let timers = ManualTimerService::new();
        assert!(matches!(
            timers.schedule("  ", target()),
            Err(TimerError::InvalidExpression(_))
        ));
        assert!(timers.is_empty());
    }
}

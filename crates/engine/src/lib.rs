//! # orrery-engine
//!
//! Executes process definitions.
//!
//! The [`ProcessEngine`] holds registered definitions, the work item handler
//! registry and every loaded instance. Each operation takes the instance's
//! lock, runs the activation cascade until the instance settles (waiting on
//! work items, signals, messages, timers, or finished) and returns an
//! [`InstanceSummary`](orrery_execution::InstanceSummary).
//!
//! Collaborators are pluggable:
//!
//! - [`TimerService`] schedules timer waits; [`ManualTimerService`] is the default.
//! - [`ConditionEvaluator`] decides connection conditions; [`VariableConditionEvaluator`]
//!   is the default.
//! - [`Transformer`] compiles data transformations per language; the `path`
//!   language ([`PathTransformer`]) is always available.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cascade;
pub mod condition;
pub mod config;
pub mod correlation;
mod dispatch;
mod engine;
pub mod error;
mod handle;
mod instance;
pub mod registered;
pub mod timer;
pub mod transform;

pub use condition::{ConditionError, ConditionEvaluator, VariableConditionEvaluator};
pub use config::EngineConfig;
pub use correlation::CorrelationTable;
pub use engine::ProcessEngine;
pub use error::EngineError;
pub use handle::WorkItemManagerHandle;
pub use registered::RegisteredDefinition;
pub use timer::{ManualTimerService, ScheduledTimer, TimerError, TimerService, TimerTarget};
pub use transform::{
    CompiledTransformation, PathTransformer, TransformError, TransformationCache, Transformer,
};

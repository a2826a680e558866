#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Orrery Execution
//!
//! Runtime state of process instances for the Orrery process engine.
//!
//! This crate models execution-time concepts; it does NOT contain the engine
//! that drives them. It defines:
//!
//! - [`ProcessState`] and [`NodeInstanceState`], validated by the [`transition`] module
//! - [`NodeInstance`] and its single outstanding [`NodeWait`]
//! - [`ScopeTree`] and [`VariableScope`] for nested, optionally strict variables
//! - [`CorrelationKey`] and [`TimerHandle`] for asynchronous wait-states
//! - [`Journal`] and [`JournalEntry`], a bounded audit trail per instance
//! - [`AgendaItem`], a pending cascade step
//! - [`InstanceSnapshot`], [`InstanceSummary`], and [`ErrorContext`] for
//!   persistence and inspection

pub mod agenda;
pub mod correlation;
pub mod error;
pub mod journal;
pub mod node;
pub mod scope;
pub mod snapshot;
pub mod status;
pub mod transition;

pub use agenda::AgendaItem;
pub use correlation::{CorrelationKey, TimerHandle};
pub use error::{ExecutionError, VariableError};
pub use journal::{Journal, JournalEntry};
pub use node::{NodeInstance, NodeWait};
pub use scope::{ScopeId, ScopeTree, VariableScope};
pub use snapshot::{
    ErrorContext, ErrorKind, InstanceSnapshot, InstanceSummary, JoinSnapshot, NodeInstanceSnapshot,
};
pub use status::{NodeInstanceState, ProcessState};

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Orrery Work Items
//!
//! Delegation of external work for the Orrery process engine.
//!
//! - [`WorkItem`] and [`WorkItemState`]: one unit of delegated work and its lifecycle
//! - [`WorkItemHandler`]: the pluggable capability that executes work items
//! - [`WorkItemManager`]: callbacks a handler uses to complete or abort later
//! - [`HandlerRegistry`]: handlers keyed by task type, owned by the engine
//! - [`HandlerFault`] and [`resolve_strategy`]: failure reporting and the pure
//!   mapping from a fault to a [`RecoveryAction`]

pub mod error;
pub mod fault;
pub mod handler;
pub mod item;
pub mod registry;
pub mod strategy;

pub use error::{ManagerError, RegistryError, WorkItemError};
pub use fault::HandlerFault;
pub use handler::{WorkItemHandler, WorkItemManager, WorkItemOutcome};
pub use item::{DataMap, WorkItem, WorkItemState};
pub use orrery_definition::{HandlingStrategy, RetryConfig};
pub use registry::HandlerRegistry;
pub use strategy::{RecoveryAction, resolve_strategy};

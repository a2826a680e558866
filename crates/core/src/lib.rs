#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Orrery Core
//!
//! Identifiers and validated keys shared by every Orrery crate.
//!
//! ## Key Components
//!
//! - **Identifiers**: [`ProcessInstanceId`], [`NodeInstanceId`], [`WorkItemId`]
//!   (UUID-backed, `Copy`, generated at runtime)
//! - **Keys**: [`ProcessKey`], [`NodeKey`], [`TaskType`] (validated strings
//!   authored in process definitions)
//!
//! ## Usage
//!
//! ```rust
//! use orrery_core::{NodeKey, ProcessInstanceId, TaskType};
//!
//! let instance = ProcessInstanceId::v4();
//! let node: NodeKey = "approve_order".parse().unwrap();
//! let task = TaskType::new("Human Task").unwrap();
//! assert!(!instance.is_nil());
//! assert_eq!(node.as_str(), "approve_order");
//! assert_eq!(task.as_str(), "Human Task");
//! ```

pub mod id;
pub mod keys;

pub use id::*;
pub use keys::{KeyError, NodeKey, ProcessKey, TaskType};

/// Common prelude for Orrery crates
pub mod prelude {
    pub use super::{
        KeyError, NodeInstanceId, NodeKey, ProcessInstanceId, ProcessKey, TaskType, WorkItemId,
    };
}

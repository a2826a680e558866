//! Pending steps of an activation cascade.

use orrery_core::{NodeInstanceId, NodeKey};
use serde::{Deserialize, Serialize};

use crate::scope::ScopeId;

/// One unit of work on the cascade agenda.
///
/// The agenda is a stack: steps pushed last run first, which makes the
/// cascade depth-first. Steps left over when an instance halts in ERROR are
/// kept and resumed by operator recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum AgendaItem {
    /// Activate `node` inside `container`, resolving variables from `scope`.
    Activate {
        /// Node definition to activate.
        node: NodeKey,
        /// Enclosing sub-process instance, `None` at top level.
        container: Option<NodeInstanceId>,
        /// Scope the new node instance resolves variables from.
        scope: ScopeId,
    },
    /// Complete `container` if nothing is left running inside it.
    CheckContainer {
        /// Sub-process instance, `None` for the instance itself.
        container: Option<NodeInstanceId>,
    },
}

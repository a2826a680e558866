//! Per-instance journal for audit and inspection.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use orrery_core::{NodeInstanceId, NodeKey, ProcessKey, TaskType, WorkItemId};
use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationKey;
use crate::status::ProcessState;

/// A journal entry recording a significant event of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    /// The instance was started.
    InstanceStarted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Definition the instance runs.
        process: ProcessKey,
    },

    /// A node was activated.
    NodeEntered {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node definition.
        node: NodeKey,
        /// The new node instance.
        node_instance: NodeInstanceId,
    },

    /// A node instance left through its normal connections.
    NodeCompleted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node definition.
        node: NodeKey,
        /// The node instance.
        node_instance: NodeInstanceId,
    },

    /// A node instance was aborted.
    NodeAborted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node definition.
        node: NodeKey,
        /// The node instance.
        node_instance: NodeInstanceId,
    },

    /// A work item was handed to its handler.
    WorkItemDispatched {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The work item.
        work_item: WorkItemId,
        /// Its handler key.
        task_type: TaskType,
        /// Node instance waiting on it.
        node_instance: NodeInstanceId,
    },

    /// A faulted work item is executed again.
    WorkItemRetried {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The work item.
        work_item: WorkItemId,
        /// Attempt about to run (0-indexed).
        attempt: u32,
        /// Fault that triggered the retry.
        error: String,
    },

    /// A work item completed.
    WorkItemCompleted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The work item.
        work_item: WorkItemId,
    },

    /// A work item was aborted.
    WorkItemAborted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The work item.
        work_item: WorkItemId,
    },

    /// A work item was left in ERROR.
    WorkItemFailed {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The work item.
        work_item: WorkItemId,
        /// Error message.
        error: String,
    },

    /// A node instance started waiting on a correlation key.
    WaitRegistered {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The waiting node instance.
        node_instance: NodeInstanceId,
        /// What it waits for.
        key: CorrelationKey,
    },

    /// A wait was satisfied.
    WaitResolved {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The resumed node instance.
        node_instance: NodeInstanceId,
        /// The key that matched.
        key: CorrelationKey,
    },

    /// The instance changed state.
    StateChanged {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Previous state.
        from: ProcessState,
        /// New state.
        to: ProcessState,
    },

    /// A variable was written.
    VariableSet {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Variable name.
        name: String,
    },
}

impl JournalEntry {
    /// Get the timestamp of this entry.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::InstanceStarted { timestamp, .. }
            | Self::NodeEntered { timestamp, .. }
            | Self::NodeCompleted { timestamp, .. }
            | Self::NodeAborted { timestamp, .. }
            | Self::WorkItemDispatched { timestamp, .. }
            | Self::WorkItemRetried { timestamp, .. }
            | Self::WorkItemCompleted { timestamp, .. }
            | Self::WorkItemAborted { timestamp, .. }
            | Self::WorkItemFailed { timestamp, .. }
            | Self::WaitRegistered { timestamp, .. }
            | Self::WaitResolved { timestamp, .. }
            | Self::StateChanged { timestamp, .. }
            | Self::VariableSet { timestamp, .. } => *timestamp,
        }
    }

    /// Get the node instance associated with this entry, if any.
    #[must_use]
    pub fn node_instance(&self) -> Option<NodeInstanceId> {
        match self {
            Self::NodeEntered { node_instance, .. }
            | Self::NodeCompleted { node_instance, .. }
            | Self::NodeAborted { node_instance, .. }
            | Self::WorkItemDispatched { node_instance, .. }
            | Self::WaitRegistered { node_instance, .. }
            | Self::WaitResolved { node_instance, .. } => Some(*node_instance),
            _ => None,
        }
    }

    /// Get the work item associated with this entry, if any.
    #[must_use]
    pub fn work_item(&self) -> Option<WorkItemId> {
        match self {
            Self::WorkItemDispatched { work_item, .. }
            | Self::WorkItemRetried { work_item, .. }
            | Self::WorkItemCompleted { work_item, .. }
            | Self::WorkItemAborted { work_item, .. }
            | Self::WorkItemFailed { work_item, .. } => Some(*work_item),
            _ => None,
        }
    }
}

/// Append-only journal keeping at most `capacity` entries.
///
/// When full, the oldest entry is dropped and counted. A capacity of 0
/// keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    capacity: usize,
    entries: VecDeque<JournalEntry>,
    #[serde(default)]
    dropped: u64,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Append an entry, evicting the oldest one if full.
    pub fn push(&mut self, entry: JournalEntry) {
        if self.capacity > 0 && self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    /// Copy the entries out, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<JournalEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries evicted so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

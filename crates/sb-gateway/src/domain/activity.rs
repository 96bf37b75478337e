//! Bounded cross-agent activity log.

use crate::ports::{TimeSource, Timestamp};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub agent_id: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_key: Option<String>,
    pub timestamp: Timestamp,
}

/// FIFO ring of the most recent `capacity` entries.
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
    clock: Arc<dyn TimeSource>,
}

impl ActivityLog {
    pub fn new(capacity: usize, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn report(
        &self,
        agent_id: impl Into<String>,
        action: impl Into<String>,
        resource_key: Option<String>,
    ) -> ActivityEntry {
        let entry = ActivityEntry {
            agent_id: agent_id.into(),
            action: action.into(),
            resource_key,
            timestamp: self.clock.now(),
        };

        let mut entries = self.entries.lock();
        entries.push_back(entry.clone());
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        entry
    }

    /// Oldest first. The returned vector is a copy.
    pub fn get_all(&self) -> Vec<ActivityEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

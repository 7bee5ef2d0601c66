//! Bounded, insertion-ordered history of completed measurements.
//!
//! The store is shared by every request handler. A single mutex serializes
//! append, read and clear, so readers never observe a half-finished eviction.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::measurement::MeasurementResult;

/// A completed measurement with the time it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub result: MeasurementResult,
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn new(result: MeasurementResult, timestamp: String) -> Self {
        Self { result, timestamp }
    }
}

pub struct HistoryStore {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl HistoryStore {
    /// Create an empty store holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    // Every operation leaves the deque consistent, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry, evicting the oldest ones past capacity.
    /// Returns the number of evicted entries.
    pub fn append(&self, entry: HistoryEntry) -> usize {
        let mut entries = self.lock();
        entries.push_back(entry);
        let mut evicted = 0;
        while entries.len() > self.capacity {
            entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Snapshot of every entry, oldest first.
    pub fn all(&self) -> Vec<HistoryEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Remove every entry. Clearing an empty store is a no-op.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn latest(&self) -> Option<HistoryEntry> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

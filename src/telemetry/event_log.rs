//! Bounded in-memory event log.
//!
//! Keeps the most recent records and the latest pool snapshot for the admin
//! API. Oldest records are evicted once capacity is reached.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::telemetry::{snapshot::PoolSnapshot, TelemetryEvent, TelemetryHook};

#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    events: Mutex<VecDeque<TelemetryEvent>>,
    snapshot: Mutex<Option<PoolSnapshot>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            snapshot: Mutex::new(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `limit` most recent records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<TelemetryEvent> {
        match self.events.lock() {
            Ok(events) => {
                let skip = events.len().saturating_sub(limit);
                events.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    /// All retained records, oldest first.
    pub fn all(&self) -> Vec<TelemetryEvent> {
        self.recent(self.capacity)
    }

    /// Latest published pool snapshot.
    pub fn latest_snapshot(&self) -> Option<PoolSnapshot> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

impl TelemetryHook for EventLog {
    fn emit(&self, event: &TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            if events.len() == self.capacity {
                events.pop_front();
            }
            events.push_back(event.clone());
        }
    }

    fn publish_snapshot(&self, snapshot: &PoolSnapshot) {
        if let Ok(mut slot) = self.snapshot.lock() {
            *slot = Some(snapshot.clone());
        }
    }
}

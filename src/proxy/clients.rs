//! Stable small labels for client addresses.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Assigns each distinct client IP a sequential label starting at 1.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    labels: Arc<DashMap<IpAddr, u32>>,
    next: Arc<AtomicU32>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label for `ip`, allocating one on first sight.
    pub fn label(&self, ip: IpAddr) -> u32 {
        if let Some(label) = self.labels.get(&ip) {
            return *label;
        }
        *self
            .labels
            .entry(ip)
            .or_insert_with(|| self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

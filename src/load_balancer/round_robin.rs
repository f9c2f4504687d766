//! Round-robin load balancing strategy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
///
/// The cursor moves one step per inspected index, skipped ones included, so
/// it keeps rotating in configuration order regardless of health.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>], excluded: &HashSet<usize>) -> Option<usize> {
        let len = backends.len();
        if len == 0 {
            return None;
        }

        for _ in 0..len {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            if backends[index].is_healthy() && !excluded.contains(&index) {
                return Some(index);
            }
        }
        None
    }
}

//! Least Connections load balancing strategy.

use std::collections::HashSet;
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Least connections selector.
/// Selects the healthy backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>], excluded: &HashSet<usize>) -> Option<usize> {
        // min_by_key keeps the first minimum, so ties go to the lowest index.
        backends
            .iter()
            .enumerate()
            .filter(|(i, b)| b.is_healthy() && !excluded.contains(i))
            .min_by_key(|(_, b)| b.active_connections())
            .map(|(i, _)| i)
    }
}

//! Backend pool management.
//!
//! # Responsibilities
//! - Own the ordered backend list for the process lifetime
//! - Apply the configured load balancing algorithm to select backends
//! - Provide connection guards for tracking

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{backend_names, Algorithm, BackendConfig};
use crate::load_balancer::{
    backend::{Backend, BackendConnectionGuard},
    least_conn::LeastConnections,
    round_robin::RoundRobin,
    LoadBalancer,
};

/// Holds every backend plus the selection policy.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    algorithm: Algorithm,
    balancer: Box<dyn LoadBalancer>,
}

/// Point-in-time view of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub healthy: bool,
    pub active_connections: usize,
}

impl BackendPool {
    /// Create a pool from configuration. Entries whose address does not
    /// split into host and port are skipped with a warning.
    pub fn new(configs: &[BackendConfig], algorithm: Algorithm) -> Self {
        let mut backends = Vec::with_capacity(configs.len());
        for (config, name) in configs.iter().zip(backend_names(configs)) {
            match (config.host_port(), name) {
                (Some((host, port)), Some(name)) => {
                    backends.push(Arc::new(Backend::new(backends.len(), name, host, port)));
                }
                _ => tracing::warn!("Invalid backend address: {}", config.address),
            }
        }

        let balancer: Box<dyn LoadBalancer> = match algorithm {
            Algorithm::RoundRobin => Box::new(RoundRobin::new()),
            Algorithm::LeastConnections => Box::new(LeastConnections::new()),
        };

        Self {
            backends,
            algorithm,
            balancer,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Backend>> {
        self.backends.get(index)
    }

    /// Return a list of all backends (for health checking).
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Pick a healthy backend not in `excluded`.
    ///
    /// `None` means no backend is available; the caller must not retry the
    /// same candidates.
    pub fn select(&self, excluded: &HashSet<usize>) -> Option<usize> {
        let picked = self.balancer.next_server(&self.backends, excluded);
        if picked.is_none() {
            tracing::debug!(
                algo = %self.algorithm,
                backend_count = self.backends.len(),
                excluded = excluded.len(),
                "No eligible backend"
            );
        }
        picked
    }

    /// Count a new session against `index`. Dropping the guard releases it.
    pub fn acquire(&self, index: usize) -> Option<BackendConnectionGuard> {
        self.backends
            .get(index)
            .map(|backend| BackendConnectionGuard::new(backend.clone()))
    }

    /// Release one session from `index` without a guard.
    pub fn release(&self, index: usize) {
        if let Some(backend) = self.backends.get(index) {
            backend.release();
        }
    }

    pub fn statuses(&self) -> Vec<BackendStatus> {
        self.backends
            .iter()
            .map(|b| BackendStatus {
                name: b.name.clone(),
                host: b.host.clone(),
                port: b.port,
                healthy: b.is_healthy(),
                active_connections: b.active_connections(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(algorithm: Algorithm) -> BackendPool {
        let configs = vec![
            BackendConfig::named("a", "10.0.0.1:7000"),
            BackendConfig::named("b", "10.0.0.2:7000"),
            BackendConfig::named("c", "10.0.0.3:7000"),
        ];
        BackendPool::new(&configs, algorithm)
    }

    #[test]
    fn round_robin_wraps_after_three() {
        let pool = pool(Algorithm::RoundRobin);
        let none = HashSet::new();
        let picks: Vec<_> = (0..4).map(|_| pool.select(&none).unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0]);
    }

    #[test]
    fn least_conn_avoids_busy_backend() {
        let pool = pool(Algorithm::LeastConnections);
        let _g1 = pool.acquire(1).unwrap();
        let _g2 = pool.acquire(1).unwrap();
        assert_eq!(pool.select(&HashSet::new()), Some(0));
    }

    #[test]
    fn acquire_release_are_balanced() {
        let pool = pool(Algorithm::LeastConnections);
        let guard = pool.acquire(2).unwrap();
        assert_eq!(pool.get(2).unwrap().active_connections(), 1);
        drop(guard);
        assert_eq!(pool.get(2).unwrap().active_connections(), 0);

        pool.get(0).unwrap().acquire();
        pool.release(0);
        assert_eq!(pool.get(0).unwrap().active_connections(), 0);

        assert!(pool.acquire(9).is_none());
    }

    #[test]
    fn concurrent_guards_net_to_zero() {
        let pool = Arc::new(pool(Algorithm::LeastConnections));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let index = pool.select(&HashSet::new()).unwrap();
                        let _guard = pool.acquire(index).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.backends().iter().all(|b| b.active_connections() == 0));
    }

    #[test]
    fn invalid_addresses_are_skipped() {
        let configs = vec![BackendConfig::new("bad"), BackendConfig::new("10.0.0.1:1")];
        let pool = BackendPool::new(&configs, Algorithm::RoundRobin);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0).unwrap().name, "10.0.0.1");
        assert_eq!(pool.get(0).unwrap().index, 0);
    }

    #[test]
    fn unnamed_backends_on_one_host_get_distinct_names() {
        let configs = vec![
            BackendConfig::new("127.0.0.1:7001"),
            BackendConfig::new("127.0.0.1:7002"),
        ];
        let pool = BackendPool::new(&configs, Algorithm::LeastConnections);
        let names: Vec<_> = pool.statuses().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["127.0.0.1:7001", "127.0.0.1:7002"]);
    }

    #[test]
    fn statuses_reflect_state() {
        let pool = pool(Algorithm::RoundRobin);
        pool.get(1).unwrap().mark_failure(1);
        let _g = pool.acquire(0).unwrap();

        let statuses = pool.statuses();
        assert_eq!(statuses[0].active_connections, 1);
        assert!(!statuses[1].healthy);
        assert_eq!(statuses[2].name, "c");
    }
}

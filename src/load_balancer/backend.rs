//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server (host, port)
//! - Track active connections (for Least Connections LB)
//! - Track health state and hysteresis streaks

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::health::state::{HealthState, HealthTransition, ProbeOutcome, Thresholds};

/// A single backend server.
///
/// `healthy` and the streak counters are written only by the health monitor;
/// `active_connections` only by proxy sessions.
#[derive(Debug)]
pub struct Backend {
    /// Position in configuration order.
    pub index: usize,
    /// Name used in logs and telemetry.
    pub name: String,
    pub host: String,
    pub port: u16,

    active_connections: AtomicUsize,
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
}

impl Backend {
    /// Create a new backend. Backends start healthy.
    pub fn new(index: usize, name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            index,
            name: name.into(),
            host: host.into(),
            port,
            active_connections: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
        }
    }

    /// `host:port` form for logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Increment active connection count.
    pub fn acquire(&self) {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement active connection count.
    ///
    /// A release without a matching acquire is a bug in the caller. Debug
    /// builds panic; release builds log it and leave the count at zero.
    pub fn release(&self) {
        let result = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if result.is_err() {
            tracing::error!(backend = %self.name, "release without matching acquire");
            debug_assert!(false, "release without matching acquire on backend {}", self.name);
        }
    }

    // --- Health Logic ---

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn health_state(&self) -> HealthState {
        HealthState::from(self.is_healthy())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes.load(Ordering::Acquire)
    }

    /// Feed one probe outcome through the hysteresis counters.
    pub fn record_probe(
        &self,
        outcome: ProbeOutcome,
        thresholds: Thresholds,
    ) -> Option<HealthTransition> {
        match outcome {
            ProbeOutcome::Success => self.mark_success(thresholds.rise),
            ProbeOutcome::Failure => self.mark_failure(thresholds.fall),
        }
    }

    /// Report a successful check.
    pub fn mark_success(&self, rise: u32) -> Option<HealthTransition> {
        self.consecutive_failures.store(0, Ordering::Release);
        let successes = increment(&self.consecutive_successes);

        if !self.is_healthy() && successes >= rise {
            self.healthy.store(true, Ordering::Release);
            return Some(HealthTransition {
                to: HealthState::Healthy,
                streak: successes,
            });
        }
        None
    }

    /// Report a failed check.
    pub fn mark_failure(&self, fall: u32) -> Option<HealthTransition> {
        self.consecutive_successes.store(0, Ordering::Release);
        let failures = increment(&self.consecutive_failures);

        if self.is_healthy() && failures >= fall {
            self.healthy.store(false, Ordering::Release);
            return Some(HealthTransition {
                to: HealthState::Unhealthy,
                streak: failures,
            });
        }
        None
    }
}

fn increment(counter: &AtomicU32) -> u32 {
    let prev = counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_add(1)))
        .unwrap_or(u32::MAX);
    prev.saturating_add(1)
}

/// A RAII guard that holds one unit of a backend's active connection count.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
}

impl BackendConnectionGuard {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        backend.acquire();
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.release();
    }
}

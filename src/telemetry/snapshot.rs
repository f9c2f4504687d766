//! Periodic pool snapshot publication.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time;

use crate::config::Algorithm;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{BackendPool, BackendStatus};
use crate::telemetry::{now_ms, TelemetryHook};

/// Health and load of every backend at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub ts_ms: u64,
    pub algo: Algorithm,
    pub backends: Vec<BackendStatus>,
}

impl PoolSnapshot {
    pub fn capture(pool: &BackendPool) -> Self {
        Self {
            ts_ms: now_ms(),
            algo: pool.algorithm(),
            backends: pool.statuses(),
        }
    }
}

/// Publishes a [`PoolSnapshot`] to the telemetry hook on a fixed interval.
#[derive(Clone)]
pub struct SnapshotPublisher {
    pool: Arc<BackendPool>,
    hook: Arc<dyn TelemetryHook>,
    interval: Duration,
}

impl SnapshotPublisher {
    pub fn new(pool: Arc<BackendPool>, hook: Arc<dyn TelemetryHook>, interval: Duration) -> Self {
        Self {
            pool,
            hook,
            interval,
        }
    }

    pub fn publish_once(&self) {
        let snapshot = PoolSnapshot::capture(&self.pool);
        self.hook.publish_snapshot(&snapshot);
    }

    pub async fn run(self, shutdown: Shutdown) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.publish_once(),
                _ = shutdown.wait() => {
                    tracing::debug!("Snapshot publisher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

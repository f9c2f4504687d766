//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends with a bare TCP connect
//! - Update backend health state based on results
//! - Report debounced transitions to the telemetry hook

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinError;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::state::{HealthState, HealthTransition, ProbeOutcome, Thresholds};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{Backend, BackendPool};
use crate::telemetry::{now_ms, TelemetryEvent, TelemetryHook};

/// Why a probe failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Io(#[from] io::Error),
}

/// Result of probing one backend in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub index: usize,
    pub outcome: ProbeOutcome,
    pub transition: Option<HealthTransition>,
}

#[derive(Clone)]
pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    config: HealthCheckConfig,
    telemetry: Arc<dyn TelemetryHook>,
}

impl HealthMonitor {
    pub fn new(
        pool: Arc<BackendPool>,
        config: HealthCheckConfig,
        telemetry: Arc<dyn TelemetryHook>,
    ) -> Self {
        Self {
            pool,
            config,
            telemetry,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.config.fall, self.config.rise)
    }

    /// Probe forever, sleeping `interval` after each completed cycle.
    pub async fn run(self, shutdown: Shutdown) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            shutdown.wait().await;
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            timeout_secs = self.config.timeout_secs,
            fall = self.config.fall,
            rise = self.config.rise,
            backends = self.pool.len(),
            "Health monitor starting"
        );

        let interval = self.config.interval();
        loop {
            self.check_all().await;

            tokio::select! {
                _ = time::sleep(interval) => {}
                _ = shutdown.wait() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend concurrently and apply the outcomes.
    ///
    /// Each probe runs in its own task with its own deadline, so a slow or
    /// crashing probe only affects its backend.
    pub async fn check_all(&self) -> Vec<ProbeReport> {
        let thresholds = self.thresholds();
        let timeout = self.config.timeout();

        let handles: Vec<_> = self
            .pool
            .backends()
            .iter()
            .map(|backend| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    match probe(&backend.host, backend.port, timeout).await {
                        Ok(()) => ProbeOutcome::Success,
                        Err(e) => {
                            tracing::debug!(backend = %backend.name, addr = %backend.address(), error = %e, "Health probe failed");
                            ProbeOutcome::Failure
                        }
                    }
                })
            })
            .collect();

        let results = join_all(handles).await;

        let mut reports = Vec::with_capacity(results.len());
        for (backend, result) in self.pool.backends().iter().zip(results) {
            let outcome = task_outcome(backend, result);
            let transition = backend.record_probe(outcome, thresholds);

            if let Some(transition) = transition {
                self.report_transition(backend, transition);
            }
            reports.push(ProbeReport {
                index: backend.index,
                outcome,
                transition,
            });
        }
        reports
    }

    fn report_transition(&self, backend: &Backend, transition: HealthTransition) {
        match transition.to {
            HealthState::Healthy => tracing::info!(
                backend = %backend.name,
                addr = %backend.address(),
                successes = transition.streak,
                "Backend is back online"
            ),
            HealthState::Unhealthy => tracing::warn!(
                backend = %backend.name,
                addr = %backend.address(),
                failures = transition.streak,
                "Backend is offline"
            ),
        }

        self.telemetry.emit(&TelemetryEvent::Health {
            ts_ms: now_ms(),
            backend: backend.name.clone(),
            backend_port: backend.port,
            state: transition.to,
            streak: transition.streak,
        });
    }
}

/// Outcome of a finished probe task. A task that panicked or was cancelled
/// counts as a failed probe for its backend only.
fn task_outcome(backend: &Backend, result: Result<ProbeOutcome, JoinError>) -> ProbeOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(backend = %backend.name, error = %e, "Health probe task failed");
            ProbeOutcome::Failure
        }
    }
}

/// Connect to `host:port` within `timeout` and close immediately.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> Result<(), ProbeError> {
    match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            Ok(())
        }
        Ok(Err(e)) => Err(ProbeError::Io(e)),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}

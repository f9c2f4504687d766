//! Telemetry hook subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy session / health monitor
//!     → TelemetryEvent (event.rs)
//!     → TelemetryHook::emit
//!         - LogHook (structured tracing record)
//!         - MetricsHook (Prometheus counters/gauges)
//!         - EventLog (bounded ring buffer for the admin API)
//! Snapshot publisher (snapshot.rs)
//!     → TelemetryHook::publish_snapshot
//! ```
//!
//! # Design Decisions
//! - Hooks are write-only from the core's point of view
//! - Emitting must never block on I/O or fail the caller

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod event;
pub mod event_log;
pub mod snapshot;

pub use event::{EndOutcome, TelemetryEvent};
pub use event_log::EventLog;
pub use snapshot::{PoolSnapshot, SnapshotPublisher};

use crate::observability::metrics;

/// Sink for telemetry records.
pub trait TelemetryHook: Send + Sync {
    fn emit(&self, event: &TelemetryEvent);

    fn publish_snapshot(&self, _snapshot: &PoolSnapshot) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHook;

impl TelemetryHook for NullHook {
    fn emit(&self, _event: &TelemetryEvent) {}
}

/// Writes each record as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHook {
    /// Log session records at info instead of debug.
    pub extra_info: bool,
}

impl LogHook {
    pub fn new(extra_info: bool) -> Self {
        Self { extra_info }
    }
}

impl TelemetryHook for LogHook {
    fn emit(&self, event: &TelemetryEvent) {
        let record = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, kind = event.kind(), "Failed to serialize telemetry record");
                return;
            }
        };
        if self.extra_info {
            tracing::info!(target: "tcp_balancer::telemetry", kind = event.kind(), %record, "telemetry");
        } else {
            tracing::debug!(target: "tcp_balancer::telemetry", kind = event.kind(), %record, "telemetry");
        }
    }
}

/// Feeds records into the Prometheus metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsHook;

impl TelemetryHook for MetricsHook {
    fn emit(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Accept { .. } | TelemetryEvent::ConnectOk { .. } => {}
            TelemetryEvent::End {
                backend,
                duration_ms,
                bytes_up,
                bytes_down,
                outcome,
                ..
            } => match outcome {
                EndOutcome::ConnectFailed => metrics::record_connect_failure(backend),
                EndOutcome::Completed | EndOutcome::RelayError => metrics::record_session_end(
                    backend,
                    outcome.as_str(),
                    *bytes_up,
                    *bytes_down,
                    *duration_ms,
                ),
            },
            TelemetryEvent::Unavailable { .. } => metrics::record_unavailable(),
            TelemetryEvent::Health { backend, state, .. } => {
                metrics::record_backend_health(backend, state.is_healthy())
            }
        }
    }

    fn publish_snapshot(&self, snapshot: &PoolSnapshot) {
        for backend in &snapshot.backends {
            metrics::record_backend_health(&backend.name, backend.healthy);
            metrics::record_active_connections(&backend.name, backend.active_connections);
        }
    }
}

/// Forwards every record to each inner hook in order.
#[derive(Default, Clone)]
pub struct Fanout {
    hooks: Vec<Arc<dyn TelemetryHook>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn TelemetryHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl TelemetryHook for Fanout {
    fn emit(&self, event: &TelemetryEvent) {
        for hook in &self.hooks {
            hook.emit(event);
        }
    }

    fn publish_snapshot(&self, snapshot: &PoolSnapshot) {
        for hook in &self.hooks {
            hook.publish_snapshot(snapshot);
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

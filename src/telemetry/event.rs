//! Telemetry records.

use serde::Serialize;

use crate::config::Algorithm;
use crate::health::state::HealthState;

/// How a backend attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOutcome {
    /// Relay finished with both directions closed cleanly.
    Completed,
    /// Relay stopped on an I/O error after connecting.
    RelayError,
    /// The backend could not be reached; the session moved on.
    ConnectFailed,
}

impl EndOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndOutcome::Completed => "completed",
            EndOutcome::RelayError => "relay_error",
            EndOutcome::ConnectFailed => "connect_failed",
        }
    }
}

/// A structured record emitted at a point in the session or health state
/// machine. Serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Client connection accepted.
    Accept {
        cid: String,
        ts_ms: u64,
        client_peer: u32,
        algo: Algorithm,
    },
    /// Backend connection established; relaying starts.
    ConnectOk {
        cid: String,
        ts_ms: u64,
        client_peer: u32,
        algo: Algorithm,
        backend: String,
        backend_port: u16,
    },
    /// One backend attempt finished.
    End {
        cid: String,
        ts_ms: u64,
        client_peer: u32,
        algo: Algorithm,
        backend: String,
        backend_port: u16,
        duration_ms: u64,
        bytes_up: u64,
        bytes_down: u64,
        outcome: EndOutcome,
    },
    /// No backend left; the client was told the service is unavailable.
    Unavailable {
        cid: String,
        ts_ms: u64,
        client_peer: u32,
        algo: Algorithm,
        attempts: usize,
    },
    /// Debounced health transition.
    Health {
        ts_ms: u64,
        backend: String,
        backend_port: u16,
        state: HealthState,
        streak: u32,
    },
}

impl TelemetryEvent {
    /// The `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryEvent::Accept { .. } => "accept",
            TelemetryEvent::ConnectOk { .. } => "connect_ok",
            TelemetryEvent::End { .. } => "end",
            TelemetryEvent::Unavailable { .. } => "unavailable",
            TelemetryEvent::Health { .. } => "health",
        }
    }

    /// Correlation id, for session events.
    pub fn cid(&self) -> Option<&str> {
        match self {
            TelemetryEvent::Accept { cid, .. }
            | TelemetryEvent::ConnectOk { cid, .. }
            | TelemetryEvent::End { cid, .. }
            | TelemetryEvent::Unavailable { cid, .. } => Some(cid),
            TelemetryEvent::Health { .. } => None,
        }
    }

    pub fn ts_ms(&self) -> u64 {
        match self {
            TelemetryEvent::Accept { ts_ms, .. }
            | TelemetryEvent::ConnectOk { ts_ms, .. }
            | TelemetryEvent::End { ts_ms, .. }
            | TelemetryEvent::Unavailable { ts_ms, .. }
            | TelemetryEvent::Health { ts_ms, .. } => *ts_ms,
        }
    }
}

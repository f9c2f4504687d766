//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every backend concurrently (TCP connect, bounded by timeout)
//!     → Feed outcome to the backend's hysteresis counters
//!     → Report transitions to log + telemetry hook
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     With rise/fall thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - The monitor is the only writer of health flags
//! - Health state is per-backend, not per-pool
//! - The proxy observes changes only at its next selection

pub mod active;
pub mod state;

pub use active::{probe, HealthMonitor, ProbeError, ProbeReport};
pub use state::{HealthState, HealthTransition, ProbeOutcome, Thresholds};

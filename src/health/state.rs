//! Backend health state machine.
//!
//! # States
//! - Healthy: backend receives traffic
//! - Unhealthy: backend excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= fall
//! Unhealthy → Healthy: consecutive successes >= rise
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Each outcome resets the opposite streak to zero
//! - Streaks keep counting past the threshold; only the first crossing flips state

use std::fmt;

use serde::Serialize;

/// Reported health of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

impl From<bool> for HealthState {
    fn from(healthy: bool) -> Self {
        if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// A debounced state change produced by a probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    /// State after the transition.
    pub to: HealthState,
    /// Length of the streak that caused it.
    pub streak: u32,
}

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Failure,
}

/// Hysteresis thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Consecutive failures that take a healthy backend down.
    pub fall: u32,
    /// Consecutive successes that bring an unhealthy backend up.
    pub rise: u32,
}

impl Thresholds {
    pub fn new(fall: u32, rise: u32) -> Self {
        Self { fall, rise }
    }
}

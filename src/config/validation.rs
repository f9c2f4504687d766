//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend addresses and uniqueness of names, derived ones included
//! - Validate value ranges (intervals > 0, thresholds >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{backend_names, BalancerConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("backend address '{0}' is not host:port")]
    InvalidBackendAddress(String),

    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),

    #[error("invalid bind address '{field}': '{value}'")]
    InvalidBindAddress { field: &'static str, value: String },

    #[error("{field} must be a positive number of seconds, got {value}")]
    NonPositiveDuration { field: &'static str, value: f64 },

    #[error("{field} must be at least 1")]
    ZeroThreshold { field: &'static str },

    #[error("listener.max_connections must be at least 1")]
    ZeroMaxConnections,

    #[error("telemetry.event_log_capacity must be at least 1")]
    ZeroEventLogCapacity,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut names = HashSet::new();
    for (backend, name) in config.backends.iter().zip(backend_names(&config.backends)) {
        match name {
            Some(name) => {
                if names.contains(&name) {
                    errors.push(ValidationError::DuplicateBackend(name));
                } else {
                    names.insert(name);
                }
            }
            None => errors.push(ValidationError::InvalidBackendAddress(backend.address.clone())),
        }
    }

    check_bind(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    let hc = &config.health_check;
    check_positive(&mut errors, "health_check.interval_secs", hc.interval_secs);
    check_positive(&mut errors, "health_check.timeout_secs", hc.timeout_secs);
    if hc.fall == 0 {
        errors.push(ValidationError::ZeroThreshold { field: "health_check.fall" });
    }
    if hc.rise == 0 {
        errors.push(ValidationError::ZeroThreshold { field: "health_check.rise" });
    }

    check_positive(
        &mut errors,
        "telemetry.snapshot_interval_secs",
        config.telemetry.snapshot_interval_secs,
    );
    if config.telemetry.event_log_capacity == 0 {
        errors.push(ValidationError::ZeroEventLogCapacity);
    }

    if config.observability.metrics_enabled {
        check_bind(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_bind(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: f64) {
    // `Duration::from_secs_f64` panics on negative, NaN and overflowing input.
    if !(value.is_finite() && value > 0.0 && value < u32::MAX as f64) {
        errors.push(ValidationError::NonPositiveDuration { field, value });
    }
}

fn check_bind(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            field,
            value: value.to_string(),
        });
    }
}

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions, health monitor, lifecycle:
//!     → logging.rs (tracing subscriber, EnvFilter)
//!     → metrics.rs (fed by telemetry::MetricsHook)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape on observability.metrics_address
//! ```
//!
//! # Design Decisions
//! - Every session log line carries its correlation id as `cid`
//! - The metrics recorder is only installed when enabled in config

pub mod logging;
pub mod metrics;

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → optional TOML file (loader.rs)
//!     → environment overrides: ALGO, LB_PORT, HC_* (loader.rs)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → shared by value/Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend set is fixed for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    backend_names, AdminConfig, Algorithm, BackendConfig, BalancerConfig, HealthCheckConfig,
    ListenerConfig, ObservabilityConfig, TelemetryConfig,
};

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Selection policy.
    pub balancer: PolicyConfig,

    /// Backend server definitions, in rotation order.
    pub backends: Vec<BackendConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Telemetry hook settings.
    pub telemetry: TelemetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            balancer: PolicyConfig::default(),
            backends: default_backends(),
            health_check: HealthCheckConfig::default(),
            telemetry: TelemetryConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl BalancerConfig {
    /// A configuration with the given backends and defaults everywhere else.
    pub fn with_backends(backends: Vec<BackendConfig>) -> Self {
        Self {
            backends,
            ..Self::default()
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9000").
    pub bind_address: String,

    /// Maximum concurrent client sessions (backpressure).
    pub max_connections: usize,

    /// How long shutdown waits for in-flight sessions, in seconds.
    pub drain_timeout_secs: u64,
}

impl ListenerConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9000".to_string(),
            max_connections: 10_000,
            drain_timeout_secs: 30,
        }
    }
}

/// Backend selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum Algorithm {
    /// Cyclic selection over healthy backends in configuration order.
    #[default]
    #[serde(rename = "rr", alias = "round_robin")]
    RoundRobin,
    /// Healthy backend with the fewest active sessions.
    #[serde(rename = "lc", alias = "least_conn")]
    LeastConnections,
}

impl Algorithm {
    /// Short name used in logs and telemetry records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "rr",
            Algorithm::LeastConnections => "lc",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rr" | "round_robin" => Ok(Algorithm::RoundRobin),
            "lc" | "least_conn" => Ok(Algorithm::LeastConnections),
            other => Err(format!("unknown algorithm '{}', expected 'rr' or 'lc'", other)),
        }
    }
}

/// Selection policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    pub algorithm: Algorithm,
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend identifier for logs and telemetry. Defaults to the host, or
    /// to the full address when another unnamed backend shares the host.
    #[serde(default)]
    pub name: Option<String>,

    /// Backend address as `host:port` (e.g., "server1:18861").
    pub address: String,
}

impl BackendConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Split the address into host and port.
    ///
    /// The port is taken after the last `:`; bracketed IPv6 hosts are unwrapped.
    pub fn host_port(&self) -> Option<(String, u16)> {
        let (host, port) = self.address.rsplit_once(':')?;
        let port = port.parse::<u16>().ok()?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return None;
        }
        Some((host.to_string(), port))
    }
}

/// Resolve the display name of every backend, in order.
///
/// Entries whose address does not split into host and port resolve to `None`.
pub fn backend_names(backends: &[BackendConfig]) -> Vec<Option<String>> {
    let mut unnamed_hosts: HashMap<String, usize> = HashMap::new();
    for backend in backends.iter().filter(|b| b.name.is_none()) {
        if let Some((host, _)) = backend.host_port() {
            *unnamed_hosts.entry(host).or_default() += 1;
        }
    }

    backends
        .iter()
        .map(|backend| {
            let (host, _) = backend.host_port()?;
            Some(match &backend.name {
                Some(name) => name.clone(),
                None if unnamed_hosts.get(&host).copied().unwrap_or(0) > 1 => {
                    backend.address.trim().to_string()
                }
                None => host,
            })
        })
        .collect()
}

fn default_backends() -> Vec<BackendConfig> {
    ["server1", "server2", "server3"]
        .iter()
        .map(|host| BackendConfig::named(*host, format!("{}:18861", host)))
        .collect()
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Seconds between probe cycles.
    pub interval_secs: f64,

    /// Probe connect deadline in seconds.
    pub timeout_secs: f64,

    /// Consecutive failures before marking a backend down.
    pub fall: u32,

    /// Consecutive successes before marking a backend up.
    pub rise: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 2.0,
            timeout_secs: 1.0,
            fall: 2,
            rise: 2,
        }
    }
}

/// Telemetry hook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log per-session lifecycle at info instead of debug.
    pub extra_info: bool,

    /// Number of records retained by the in-memory event log.
    pub event_log_capacity: usize,

    /// Seconds between pool snapshots.
    pub snapshot_interval_secs: f64,
}

impl TelemetryConfig {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs_f64(self.snapshot_interval_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            extra_info: false,
            event_log_capacity: 2000,
            snapshot_interval_secs: 1.0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: placeholder, override before enabling.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

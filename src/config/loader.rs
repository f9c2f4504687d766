//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{BackendConfig, BalancerConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Env {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<BalancerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => BalancerConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment-style overrides using `lookup` to fetch each key.
///
/// Recognized keys: `ALGO`, `LB_PORT`, `HC_INTERVAL`, `HC_TIMEOUT`,
/// `HC_FALL`, `HC_RISE`, `EXTRA_INFO`, `LB_BACKENDS`.
pub fn apply_env_overrides<F>(config: &mut BalancerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("ALGO") {
        config.balancer.algorithm = value.parse().map_err(|reason| ConfigError::Env {
            key: "ALGO",
            value: value.clone(),
            reason,
        })?;
    }

    if let Some(value) = lookup("LB_PORT") {
        let port: u16 = parse_env("LB_PORT", &value)?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(value) = lookup("HC_INTERVAL") {
        config.health_check.interval_secs = parse_env("HC_INTERVAL", &value)?;
    }
    if let Some(value) = lookup("HC_TIMEOUT") {
        config.health_check.timeout_secs = parse_env("HC_TIMEOUT", &value)?;
    }
    if let Some(value) = lookup("HC_FALL") {
        config.health_check.fall = parse_env("HC_FALL", &value)?;
    }
    if let Some(value) = lookup("HC_RISE") {
        config.health_check.rise = parse_env("HC_RISE", &value)?;
    }

    if let Some(value) = lookup("EXTRA_INFO") {
        let flag: u8 = parse_env("EXTRA_INFO", &value)?;
        config.telemetry.extra_info = flag != 0;
    }

    if let Some(value) = lookup("LB_BACKENDS") {
        config.backends = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(BackendConfig::new)
            .collect();
    }

    Ok(())
}

fn parse_env<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

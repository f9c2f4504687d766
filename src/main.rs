//! TCP Load Balancer (v1)
//!
//! Accepts client TCP connections and splices each one onto a healthy
//! backend chosen by round-robin or least-connections.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                 TCP BALANCER                  │
//!                       │                                               │
//!   Client ─────────────┼─▶ net::Listener ─▶ proxy::Session             │
//!                       │                       │                       │
//!                       │                       ▼                       │
//!                       │             load_balancer::BackendPool        │
//!                       │               (rr / lc, health flags)         │
//!                       │                       │                       │
//!   Client ◀────────────┼──── proxy::relay ◀────┴─────────▶ Backend ────┼──▶ Server
//!                       │                                               │
//!                       │  health::HealthMonitor ──▶ health flags       │
//!                       │  telemetry (log, metrics, event log) ◀── all  │
//!                       │  admin API, lifecycle (signals, drain)        │
//!                       └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use tcp_balancer::config::load_config;
use tcp_balancer::lifecycle;
use tcp_balancer::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "tcp-balancer")]
#[command(about = "TCP load balancer with active health checks", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        algorithm = %config.balancer.algorithm,
        backends = config.backends.len(),
        "tcp-balancer starting"
    );

    lifecycle::run(config).await?;
    Ok(())
}

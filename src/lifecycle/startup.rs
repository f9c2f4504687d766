//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start supervised background tasks (health checks, snapshots)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners are bound in `build`, traffic is served only from `run`
//! - The proxy listener starts last, after the pool and telemetry exist

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{serve_admin, AdminState};
use crate::config::BalancerConfig;
use crate::health::HealthMonitor;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::lifecycle::supervisor::{supervise, RestartPolicy};
use crate::lifecycle::Shutdown;
use crate::load_balancer::BackendPool;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::{ProxyContext, ProxyServer};
use crate::telemetry::{EventLog, Fanout, LogHook, MetricsHook, SnapshotPublisher, TelemetryHook};

/// Grace period for background tasks after the proxy has drained.
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("No usable backends configured")]
    NoBackends,

    #[error("Invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Proxy listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("Admin API: {0}")]
    Admin(std::io::Error),

    #[error("Metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// A fully initialized balancer with bound listeners.
pub struct Balancer {
    config: BalancerConfig,
    pool: Arc<BackendPool>,
    events: Arc<EventLog>,
    telemetry: Arc<dyn TelemetryHook>,
    listener: Listener,
    admin_listener: Option<TcpListener>,
}

impl Balancer {
    /// Build the pool and telemetry sinks and bind every listener.
    pub async fn build(config: BalancerConfig) -> Result<Self, StartupError> {
        let pool = Arc::new(BackendPool::new(
            &config.backends,
            config.balancer.algorithm,
        ));
        if pool.is_empty() {
            return Err(StartupError::NoBackends);
        }

        let events = Arc::new(EventLog::new(config.telemetry.event_log_capacity));
        let mut fanout = Fanout::new()
            .with(Arc::new(LogHook::new(config.telemetry.extra_info)))
            .with(events.clone());

        if config.observability.metrics_enabled {
            let addr = parse_addr("metrics", &config.observability.metrics_address)?;
            metrics::init_metrics(addr)?;
            fanout = fanout.with(Arc::new(MetricsHook));
        }
        let telemetry: Arc<dyn TelemetryHook> = Arc::new(fanout);

        let admin_listener = if config.admin.enabled {
            let addr = parse_addr("admin", &config.admin.bind_address)?;
            Some(TcpListener::bind(addr).await.map_err(StartupError::Admin)?)
        } else {
            None
        };

        let listener = Listener::bind(&config.listener).await?;

        tracing::info!(
            algorithm = %pool.algorithm(),
            backends = pool.len(),
            health_checks = config.health_check.enabled,
            admin = config.admin.enabled,
            metrics = config.observability.metrics_enabled,
            "Balancer initialized"
        );

        Ok(Self {
            config,
            pool,
            events,
            telemetry,
            listener,
            admin_listener,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Serve traffic until `shutdown` fires, then drain and stop background tasks.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), StartupError> {
        let mut tasks = Vec::new();

        if self.config.health_check.enabled {
            let monitor = HealthMonitor::new(
                self.pool.clone(),
                self.config.health_check.clone(),
                self.telemetry.clone(),
            );
            tasks.push(supervise(
                "health_monitor",
                shutdown.clone(),
                RestartPolicy::default(),
                move |shutdown| monitor.clone().run(shutdown),
            ));
        }

        let publisher = SnapshotPublisher::new(
            self.pool.clone(),
            self.telemetry.clone(),
            self.config.telemetry.snapshot_interval(),
        );
        tasks.push(supervise(
            "snapshot_publisher",
            shutdown.clone(),
            RestartPolicy::default(),
            move |shutdown| publisher.clone().run(shutdown),
        ));

        let admin_task = self.admin_listener.map(|listener| {
            let state = AdminState::new(
                self.pool.clone(),
                self.events.clone(),
                &self.config.admin.api_key,
            );
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_admin(listener, state, shutdown).await {
                    tracing::error!(error = %e, "Admin API failed");
                }
            })
        });

        let ctx = Arc::new(ProxyContext::new(
            self.pool.clone(),
            self.telemetry.clone(),
            self.config.telemetry.extra_info,
        ));
        let server = ProxyServer::new(ctx, self.config.listener.drain_timeout());
        let result = server.run(self.listener, shutdown.clone()).await;

        // The proxy may have stopped on its own; make sure everything else follows.
        shutdown.trigger();
        let stop_all = async {
            for task in tasks {
                let _ = task.await;
            }
            if let Some(task) = admin_task {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(TASK_STOP_TIMEOUT, stop_all).await.is_err() {
            tracing::warn!("Background tasks did not stop in time");
        }

        tracing::info!("Shutdown complete");
        result.map_err(StartupError::from)
    }
}

/// Build the balancer, install signal handling, and serve until SIGINT/SIGTERM.
pub async fn run(config: BalancerConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let balancer = Balancer::build(config).await?;
    let _signals = spawn_signal_listener(shutdown.clone());
    balancer.run(shutdown).await
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

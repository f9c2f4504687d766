//! Admin HTTP API.
//!
//! # Responsibilities
//! - Expose backend health, load, and recent telemetry over HTTP
//! - Require a bearer API key on every route
//!
//! # Design Decisions
//! - Read-only: the API never mutates the pool
//! - Served on its own listener, separate from balanced traffic

pub mod auth;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::lifecycle::Shutdown;
use crate::load_balancer::BackendPool;
use crate::telemetry::EventLog;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<BackendPool>,
    pub events: Arc<EventLog>,
    pub api_key: Arc<str>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(pool: Arc<BackendPool>, events: Arc<EventLog>, api_key: &str) -> Self {
        Self {
            pool,
            events,
            api_key: Arc::from(api_key),
            started: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/snapshot", get(get_snapshot))
        .route("/admin/events", get(get_events))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API on `listener` until `shutdown` fires.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}

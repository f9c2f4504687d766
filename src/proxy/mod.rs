//! Connection proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → server.rs (spawn per client)
//!     → session.rs (select backend, connect, retry on connect failure)
//!     → relay.rs (byte copy in both directions)
//!     → BackendConnectionGuard dropped, End record emitted
//! ```
//!
//! # Design Decisions
//! - Connect failures are retried on a different backend, relay errors are not
//! - Backend connect has no timeout of its own; the OS connect timeout applies
//! - Sessions share one immutable `ProxyContext`

use std::sync::Arc;

use crate::load_balancer::BackendPool;
use crate::telemetry::TelemetryHook;

pub mod clients;
pub mod relay;
pub mod server;
pub mod session;

pub use clients::ClientRegistry;
pub use relay::{relay, RelayStats, RELAY_CHUNK_SIZE};
pub use server::ProxyServer;
pub use session::{Session, SessionOutcome, SessionState, SERVICE_UNAVAILABLE};

/// Shared state every session reads.
pub struct ProxyContext {
    pub pool: Arc<BackendPool>,
    pub telemetry: Arc<dyn TelemetryHook>,
    pub clients: ClientRegistry,
    /// Promote per-connection log lines from debug to info.
    pub extra_info: bool,
}

impl ProxyContext {
    pub fn new(pool: Arc<BackendPool>, telemetry: Arc<dyn TelemetryHook>, extra_info: bool) -> Self {
        Self {
            pool,
            telemetry,
            clients: ClientRegistry::new(),
            extra_info,
        }
    }
}

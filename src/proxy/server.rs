//! Accept loop for the TCP balancer.
//!
//! # Responsibilities
//! - Accept clients while shutdown has not been triggered
//! - Spawn one session task per client, holding its connection permit
//! - Keep the loop free of per-session work: the session is built in its task
//! - On shutdown, stop accepting and drain in-flight sessions

use std::sync::Arc;
use std::time::Duration;

use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::proxy::session::Session;
use crate::proxy::ProxyContext;

/// Pause after a failed `accept` so a persistent error (e.g. EMFILE) does
/// not spin the loop.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

pub struct ProxyServer {
    ctx: Arc<ProxyContext>,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
}

impl ProxyServer {
    pub fn new(ctx: Arc<ProxyContext>, drain_timeout: Duration) -> Self {
        Self {
            ctx,
            tracker: ConnectionTracker::new(),
            drain_timeout,
        }
    }

    pub fn context(&self) -> &Arc<ProxyContext> {
        &self.ctx
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Serve until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                algorithm = %self.ctx.pool.algorithm(),
                backends = self.ctx.pool.len(),
                "Load balancer listening"
            );
        }

        loop {
            let accepted = tokio::select! {
                res = listener.accept() => res,
                _ = shutdown.wait() => break,
            };

            let (stream, peer, permit) = match accepted {
                Ok(conn) => conn,
                Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
            }

            let ctx = Arc::clone(&self.ctx);
            let in_flight = self.tracker.track();
            tokio::spawn(async move {
                let _permit = permit;
                let _in_flight = in_flight;
                Session::new(ctx, peer).run(stream).await;
            });
        }

        drop(listener);
        let active = self.tracker.active_count();
        tracing::info!(active_sessions = active, "Stopped accepting, draining sessions");

        if self.tracker.drain(self.drain_timeout).await {
            tracing::info!("All sessions drained");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                timeout_secs = self.drain_timeout.as_secs(),
                "Drain timeout elapsed with sessions still open"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Algorithm, BackendConfig};
    use crate::load_balancer::BackendPool;
    use crate::telemetry::{TelemetryEvent, TelemetryHook};
    use tokio::net::{TcpListener, TcpStream};

    /// Stalls the calling thread on every `accept` record.
    struct SlowAcceptHook(Duration);

    impl TelemetryHook for SlowAcceptHook {
        fn emit(&self, event: &TelemetryEvent) {
            if matches!(event, TelemetryEvent::Accept { .. }) {
                std::thread::sleep(self.0);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn slow_telemetry_sink_does_not_hold_up_accept() {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let pool = Arc::new(BackendPool::new(
            &[BackendConfig::new(dead_addr.to_string())],
            Algorithm::RoundRobin,
        ));
        let ctx = Arc::new(ProxyContext::new(
            pool,
            Arc::new(SlowAcceptHook(Duration::from_millis(400))),
            false,
        ));
        let server = ProxyServer::new(ctx, Duration::from_secs(2));
        let tracker = server.tracker().clone();

        let listener = Listener::from_listener(TcpListener::bind("127.0.0.1:0").await.unwrap(), 16)
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(server.run(listener, shutdown.clone()));

        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(TcpStream::connect(addr).await.unwrap());
        }

        let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
        while tracker.active_count() < 3 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(tracker.active_count(), 3);

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert_eq!(tracker.active_count(), 0);
    }
}

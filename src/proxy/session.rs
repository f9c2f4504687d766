//! Per-client session state machine.
//!
//! ```text
//! ACCEPTED → SELECTING → CONNECTING → RELAYING → CLOSED
//!                ▲            │
//!                └────────────┘  connect failed (at most once per backend)
//! SELECTING → CLOSED             no eligible backend left
//! ```
//!
//! A session that reached RELAYING is never retried: a partially streamed
//! byte relay cannot be resumed against a different backend.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::load_balancer::Backend;
use crate::net::SessionId;
use crate::proxy::relay::relay;
use crate::proxy::ProxyContext;
use crate::telemetry::{now_ms, EndOutcome, TelemetryEvent};

/// Sent to the client when no backend can take the session.
pub const SERVICE_UNAVAILABLE: &[u8] = b"Service unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Selecting,
    Connecting,
    Relaying,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Accepted => "accepted",
            SessionState::Selecting => "selecting",
            SessionState::Connecting => "connecting",
            SessionState::Relaying => "relaying",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Bytes were relayed through `backend`.
    Relayed {
        backend: usize,
        connect_attempts: usize,
        bytes_up: u64,
        bytes_down: u64,
        clean: bool,
    },
    /// Every eligible backend was unhealthy or refused the connection.
    Unavailable { connect_attempts: usize },
}

impl SessionOutcome {
    pub fn connect_attempts(&self) -> usize {
        match self {
            SessionOutcome::Relayed {
                connect_attempts, ..
            }
            | SessionOutcome::Unavailable { connect_attempts } => *connect_attempts,
        }
    }
}

/// One accepted client connection.
pub struct Session {
    ctx: Arc<ProxyContext>,
    id: SessionId,
    client_addr: SocketAddr,
    client_peer: u32,
    tried: HashSet<usize>,
    state: SessionState,
    started: Instant,
}

impl Session {
    /// Register the client and emit the `accept` record.
    pub fn new(ctx: Arc<ProxyContext>, client_addr: SocketAddr) -> Self {
        let id = SessionId::new();
        let client_peer = ctx.clients.label(client_addr.ip());

        if ctx.extra_info {
            tracing::info!(cid = %id, client = %client_addr, client_peer, "New connection from client");
        } else {
            tracing::debug!(cid = %id, client = %client_addr, client_peer, "New connection from client");
        }

        ctx.telemetry.emit(&TelemetryEvent::Accept {
            cid: id.to_string(),
            ts_ms: now_ms(),
            client_peer,
            algo: ctx.pool.algorithm(),
        });

        Self {
            ctx,
            id,
            client_addr,
            client_peer,
            tried: HashSet::new(),
            state: SessionState::Accepted,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to CLOSED.
    pub async fn run(mut self, mut client: TcpStream) -> SessionOutcome {
        let max_attempts = self.ctx.pool.len();

        for _ in 0..max_attempts {
            self.transition(SessionState::Selecting);
            let Some(index) = self.ctx.pool.select(&self.tried) else {
                break;
            };
            self.tried.insert(index);
            let Some(guard) = self.ctx.pool.acquire(index) else {
                continue;
            };
            let backend = guard.backend().clone();

            self.transition(SessionState::Connecting);
            self.log_connecting(&backend);
            let attempt_started = Instant::now();

            let backend_stream = match TcpStream::connect((backend.host.as_str(), backend.port)).await {
                Ok(stream) => stream,
                Err(e) => {
                    drop(guard);
                    tracing::warn!(
                        cid = %self.id,
                        backend = %backend.name,
                        addr = %backend.address(),
                        error = %e,
                        "Backend connect failed, selecting another"
                    );
                    self.emit_end(&backend, attempt_started, 0, 0, EndOutcome::ConnectFailed);
                    continue;
                }
            };

            self.ctx.telemetry.emit(&TelemetryEvent::ConnectOk {
                cid: self.id.to_string(),
                ts_ms: now_ms(),
                client_peer: self.client_peer,
                algo: self.ctx.pool.algorithm(),
                backend: backend.name.clone(),
                backend_port: backend.port,
            });
            if self.ctx.extra_info {
                tracing::info!(cid = %self.id, backend = %backend.name, "Connection established");
            }

            self.transition(SessionState::Relaying);
            let stats = relay(client, backend_stream).await;
            drop(guard);
            self.transition(SessionState::Closed);

            let outcome = match &stats.error {
                None => EndOutcome::Completed,
                Some(e) => {
                    tracing::debug!(cid = %self.id, backend = %backend.name, error = %e, "Relay ended with error");
                    EndOutcome::RelayError
                }
            };
            self.emit_end(&backend, attempt_started, stats.bytes_up, stats.bytes_down, outcome);

            return SessionOutcome::Relayed {
                backend: index,
                connect_attempts: self.tried.len(),
                bytes_up: stats.bytes_up,
                bytes_down: stats.bytes_down,
                clean: stats.is_clean(),
            };
        }

        self.unavailable(&mut client).await
    }

    async fn unavailable<S>(&mut self, client: &mut S) -> SessionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::warn!(
            cid = %self.id,
            client = %self.client_addr,
            attempts = self.tried.len(),
            "No backend available"
        );

        let _ = client.write_all(SERVICE_UNAVAILABLE).await;
        let _ = client.flush().await;
        let _ = client.shutdown().await;
        self.transition(SessionState::Closed);

        self.ctx.telemetry.emit(&TelemetryEvent::Unavailable {
            cid: self.id.to_string(),
            ts_ms: now_ms(),
            client_peer: self.client_peer,
            algo: self.ctx.pool.algorithm(),
            attempts: self.tried.len(),
        });

        SessionOutcome::Unavailable {
            connect_attempts: self.tried.len(),
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(cid = %self.id, from = %self.state, to = %next, "Session state");
        self.state = next;
    }

    fn log_connecting(&self, backend: &Backend) {
        if self.ctx.extra_info {
            tracing::info!(cid = %self.id, backend = %backend.name, addr = %backend.address(), "Connecting client to backend");
        } else {
            tracing::debug!(cid = %self.id, backend = %backend.name, addr = %backend.address(), "Connecting client to backend");
        }
    }

    fn emit_end(
        &self,
        backend: &Backend,
        attempt_started: Instant,
        bytes_up: u64,
        bytes_down: u64,
        outcome: EndOutcome,
    ) {
        let duration_ms = attempt_started.elapsed().as_millis() as u64;
        tracing::debug!(
            cid = %self.id,
            backend = %backend.name,
            duration_ms,
            session_ms = self.started.elapsed().as_millis() as u64,
            bytes_up,
            bytes_down,
            outcome = outcome.as_str(),
            "Session attempt ended"
        );

        self.ctx.telemetry.emit(&TelemetryEvent::End {
            cid: self.id.to_string(),
            ts_ms: now_ms(),
            client_peer: self.client_peer,
            algo: self.ctx.pool.algorithm(),
            backend: backend.name.clone(),
            backend_port: backend.port,
            duration_ms,
            bytes_up,
            bytes_down,
            outcome,
        });
    }
}

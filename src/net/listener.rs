//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind: {0}")]
    Bind(std::io::Error),

    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),

    #[error("Connection limiter closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent sessions.
///
/// When the limit is reached, `accept` waits until a slot frees up; pending
/// clients queue in the kernel backlog meanwhile.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Self::from_listener(listener, config.max_connections)
    }

    /// Wrap an already bound listener.
    pub fn from_listener(listener: TcpListener, max_connections: usize) -> Result<Self, ListenerError> {
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// The returned permit must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A connection slot, returned to the listener on drop (including on panic).
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_are_returned_on_drop() {
        let config = ListenerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections: 2,
            drain_timeout_secs: 1,
        };
        let listener = Listener::bind(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);

        drop(permit);
        assert_eq!(listener.available_permits(), 2);
        assert_eq!(listener.max_connections(), 2);
    }

    #[tokio::test]
    async fn bad_address_is_bind_error() {
        let config = ListenerConfig {
            bind_address: "not-an-address".to_string(),
            ..ListenerConfig::default()
        };
        assert!(matches!(
            Listener::bind(&config).await,
            Err(ListenerError::Bind(_))
        ));
    }
}

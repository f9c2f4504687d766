//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tcp_balancer::config::{Algorithm, BackendConfig, BalancerConfig};
use tcp_balancer::lifecycle::{Balancer, StartupError};
use tcp_balancer::load_balancer::BackendPool;
use tcp_balancer::telemetry::EventLog;
use tcp_balancer::Shutdown;

/// Start a backend that greets each connection with `tag\n`, then echoes
/// everything it reads until the client closes.
pub async fn start_tagged_backend(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if socket.write_all(format!("{}\n", tag).as_bytes()).await.is_err() {
                    return;
                }
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that sends `tag\n` and closes the connection at once.
pub async fn start_closing_backend(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(format!("{}\n", tag).as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    addr
}

/// Start a backend that sends `tag\n` and then aborts the connection with
/// a TCP reset.
pub async fn start_resetting_backend(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(format!("{}\n", tag).as_bytes()).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = socket.set_linger(Some(Duration::ZERO));
            drop(socket);
        }
    });

    addr
}

/// A listener that never accepts and whose backlog is full, so further
/// connects hang. Keep the returned streams and listener alive while in use.
pub async fn start_blackhole() -> (SocketAddr, TcpListener, Vec<TcpStream>) {
    let socket = tokio::net::TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(0).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..64 {
        match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => queued.push(stream),
            Ok(Err(e)) => panic!("connect to blackhole failed: {}", e),
            Err(_) => return (addr, listener, queued),
        }
    }
    panic!("listener backlog never filled");
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Config for a local test balancer: ephemeral port, no health checks.
pub fn test_config(algorithm: Algorithm, backends: &[(&str, SocketAddr)]) -> BalancerConfig {
    let backends = backends
        .iter()
        .map(|(name, addr)| BackendConfig::named(*name, addr.to_string()))
        .collect();

    let mut config = BalancerConfig::with_backends(backends);
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.drain_timeout_secs = 1;
    config.balancer.algorithm = algorithm;
    config.health_check.enabled = false;
    config
}

/// A balancer running in the background.
pub struct TestBalancer {
    pub addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    pub pool: Arc<BackendPool>,
    pub events: Arc<EventLog>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), StartupError>>,
}

impl TestBalancer {
    pub async fn stop(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("balancer did not stop in time")
            .expect("balancer task panicked")
    }
}

pub async fn start_balancer(config: BalancerConfig) -> TestBalancer {
    let balancer = Balancer::build(config).await.unwrap();
    let addr = balancer.local_addr().unwrap();
    let admin_addr = balancer.admin_addr();
    let pool = balancer.pool().clone();
    let events = balancer.events().clone();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(balancer.run(shutdown.clone()));

    TestBalancer {
        addr,
        admin_addr,
        pool,
        events,
        shutdown,
        handle,
    }
}

/// Connect through the balancer and return the stream plus the backend tag.
pub async fn connect_tagged(addr: SocketAddr) -> (BufReader<TcpStream>, String) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("no greeting from backend")
        .unwrap();
    (reader, line.trim_end().to_string())
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn active_connections(pool: &BackendPool) -> Vec<usize> {
    pool.backends().iter().map(|b| b.active_connections()).collect()
}

//! Bidirectional byte relay.
//!
//! Each direction reads at most [`RELAY_CHUNK_SIZE`] bytes, writes and
//! flushes them, and only then reads again, so a slow peer stalls its
//! direction instead of growing a queue. The relay ends as soon as either
//! direction reaches end-of-data or fails; both streams are then shut down
//! and closed.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on bytes buffered per read.
pub const RELAY_CHUNK_SIZE: usize = 64 * 1024;

/// What a finished relay moved.
#[derive(Debug, Default)]
pub struct RelayStats {
    /// Client → backend.
    pub bytes_up: u64,
    /// Backend → client.
    pub bytes_down: u64,
    /// The I/O error that ended the relay, if any.
    pub error: Option<io::Error>,
}

impl RelayStats {
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Splice `client` and `backend` until either direction finishes or fails.
///
/// Both streams are consumed and dropped (closed) before this returns.
pub async fn relay<C, B>(client: C, backend: B) -> RelayStats
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let up = AtomicU64::new(0);
    let down = AtomicU64::new(0);

    let result = tokio::select! {
        res = pump(&mut client_read, &mut backend_write, &up) => res,
        res = pump(&mut backend_read, &mut client_write, &down) => res,
    };

    // Either peer may already be gone.
    let _ = backend_write.shutdown().await;
    let _ = client_write.shutdown().await;

    RelayStats {
        bytes_up: up.load(Ordering::Relaxed),
        bytes_down: down.load(Ordering::Relaxed),
        error: result.err(),
    }
}

/// Copy `src` into `dst` until `src` reaches end-of-data.
async fn pump<R, W>(src: &mut R, dst: &mut W, counter: &AtomicU64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_CHUNK_SIZE];
    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        dst.write_all(&buf[..n]).await?;
        dst.flush().await?;
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

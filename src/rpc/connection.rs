//! Connection lifecycle: lazy dial with a bounded retry budget, and teardown.
//!
//! [`ConnectionManager`] holds at most one open stream. It is always used
//! from behind the access serializer, so none of its methods lock.
//!
//! ```text
//!   absent ──ensure()──▶ dial #1 ──fail──▶ sleep ──▶ … dial #N ──fail──▶ Connection error, or
//!      ▲                   │ ok                                      connect Timeout if #N hit
//!      │                   ▼                                         its deadline (still absent)
//!      └───close()─────  open ──ensure()──▶ (no-op)
//! ```

use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::rpc::error::{RpcError, TimeoutStage};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How hard [`ConnectionManager::ensure`] tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total dial attempts, including the first.
    pub max_attempts: u32,
    /// Fixed pause between two failed attempts.
    pub backoff: Duration,
    /// Upper bound for one dial attempt.
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Dialer
// ---------------------------------------------------------------------------

/// Opens a byte stream to the backend.
///
/// The production implementation is [`TcpDialer`]; tests substitute in-memory
/// or always-failing dialers.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static;

    async fn dial(&self, addr: &str) -> std::io::Result<Self::Stream>;
}

/// Plain TCP with Nagle disabled (frames are written in one go).
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, addr: &str) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Owner of the single persistent backend connection.
pub struct ConnectionManager<D: Dialer> {
    addr: String,
    dialer: D,
    policy: RetryPolicy,
    conn: Option<D::Stream>,
}

impl<D: Dialer> ConnectionManager<D> {
    pub fn new(addr: impl Into<String>, dialer: D, policy: RetryPolicy) -> Self {
        Self {
            addr: addr.into(),
            dialer,
            policy,
            conn: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Return the open stream, dialing first if there is none.
    ///
    /// An idle stream that the backend has already closed (or that holds
    /// unsolicited bytes) is discarded and redialed instead of being reused.
    ///
    /// # Errors
    ///
    /// Once `policy.max_attempts` dials have failed the manager stays in the
    /// absent state and returns [`RpcError::Timeout`] with
    /// [`TimeoutStage::Connect`] if the last attempt ran into its deadline,
    /// or [`RpcError::Connection`] otherwise.
    pub async fn ensure(&mut self) -> Result<&mut D::Stream, RpcError> {
        if let Some(stream) = self.conn.as_mut() {
            if is_stale(stream).await {
                log::info!("backend at {} dropped the idle connection; redialing", self.addr);
                self.conn = None;
            }
        }
        let stream = match self.conn.take() {
            Some(stream) => stream,
            None => self.dial_with_retry().await?,
        };
        Ok(self.conn.insert(stream))
    }

    /// Drop the stream if there is one. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            log::debug!("backend connection to {} closed", self.addr);
        }
    }

    async fn dial_with_retry(&self) -> Result<D::Stream, RpcError> {
        let max = self.policy.max_attempts.max(1);
        let mut last_err = None;
        let mut last_timed_out = false;

        for attempt in 1..=max {
            let dial = self.dialer.dial(&self.addr);
            let result = match tokio::time::timeout(self.policy.connect_timeout, dial).await {
                Ok(result) => result,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", self.policy.connect_timeout),
                )),
            };

            match result {
                Ok(stream) => {
                    log::info!("connected to transcription backend at {}", self.addr);
                    return Ok(stream);
                }
                Err(e) => {
                    log::warn!(
                        "failed to connect to {} (attempt {attempt}/{max}): {e}",
                        self.addr
                    );
                    last_timed_out = e.kind() == std::io::ErrorKind::TimedOut;
                    last_err = Some(e);
                }
            }

            if attempt < max {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        if last_timed_out {
            return Err(RpcError::Timeout {
                stage: TimeoutStage::Connect,
            });
        }
        Err(RpcError::Connection {
            addr: self.addr.clone(),
            attempts: max,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotConnected, "no dial attempted")
            }),
        })
    }
}

/// Poll an idle stream once without waiting.
///
/// Between calls nothing may be readable: EOF, an error or stray bytes all
/// mean the stream can no longer carry a request.
async fn is_stale<S: AsyncRead + Unpin>(stream: &mut S) -> bool {
    std::future::poll_fn(|cx| {
        let mut byte = [0u8; 1];
        let mut buf = ReadBuf::new(&mut byte);
        Poll::Ready(!Pin::new(&mut *stream).poll_read(cx, &mut buf).is_pending())
    })
    .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

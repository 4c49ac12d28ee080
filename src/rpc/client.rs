//! `WhisperClient`: the call surface the HTTP gateway uses.
//!
//! Every operation follows the same path:
//!
//! ```text
//! normalize inputs → build Request → acquire serializer ─┐
//!                                                        ▼   (detached task)
//!            ensure connection → write frame → read frame → release
//!                                                        │
//!        decode JSON → check `error` → record metrics ◀──┘
//! ```
//!
//! Once the serializer is acquired the rest runs in a spawned task that owns
//! the guard, so a caller that gives up mid-flight cannot leave half a frame
//! on the shared connection. Cancelling before that point (dropping the
//! future, or a [`CancellationToken`] passed to the `*_with_cancel` variants)
//! sends nothing.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::config::BackendConfig;
use crate::rpc::codec::{read_frame, write_frame};
use crate::rpc::connection::{ConnectionManager, Dialer, RetryPolicy, TcpDialer};
use crate::rpc::error::{RpcError, TimeoutStage};
use crate::rpc::messages::{AudioSource, ModelsResponse, Reply, Request, Task, TranscriptionResponse};
use crate::rpc::metrics::{Metrics, MetricsSnapshot};
use crate::rpc::serializer::{AccessGuard, AccessSerializer};

/// Largest response payload accepted by default (256 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 256 << 20;

// ---------------------------------------------------------------------------
// ClientOptions
// ---------------------------------------------------------------------------

/// Timeouts and limits for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub retry: RetryPolicy,
    /// Deadline for writing one request frame.
    pub write_timeout: Duration,
    /// Deadline for reading one response frame.
    pub read_timeout: Duration,
    /// Frames announcing more than this are rejected.
    pub max_response_bytes: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

impl ClientOptions {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            retry: config.retry_policy(),
            write_timeout: config.write_timeout(),
            read_timeout: config.read_timeout(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

// ---------------------------------------------------------------------------
// WhisperClient
// ---------------------------------------------------------------------------

/// Client for the transcription backend over one persistent connection.
///
/// Cloning is cheap; clones share the connection, the serializer and the
/// metrics. Construct one per backend and hand it to the HTTP layer.
///
/// # Example
///
/// ```rust,no_run
/// use whisper_gateway::config::BackendConfig;
/// use whisper_gateway::rpc::{Task, WhisperClient};
///
/// # async fn example() -> Result<(), whisper_gateway::rpc::RpcError> {
/// let client = WhisperClient::from_config(&BackendConfig::default());
/// let result = client
///     .transcribe_path("/tmp/a.wav", "base", None, Task::Transcribe)
///     .await?;
/// println!("{} ({})", result.text, result.language);
/// println!("{}", client.metrics());
/// # Ok(())
/// # }
/// ```
pub struct WhisperClient<D: Dialer = TcpDialer> {
    conn: AccessSerializer<ConnectionManager<D>>,
    metrics: Arc<Metrics>,
    options: ClientOptions,
}

impl<D: Dialer> Clone for WhisperClient<D> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            metrics: Arc::clone(&self.metrics),
            options: self.options,
        }
    }
}

impl WhisperClient<TcpDialer> {
    /// Client for `addr` (`host:port`) over TCP. Nothing is dialed yet.
    pub fn new(addr: impl Into<String>, options: ClientOptions) -> Self {
        Self::with_dialer(addr, TcpDialer, options)
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.addr(), ClientOptions::from_config(config))
    }
}

impl<D: Dialer> WhisperClient<D> {
    pub fn with_dialer(addr: impl Into<String>, dialer: D, options: ClientOptions) -> Self {
        Self {
            conn: AccessSerializer::new(ConnectionManager::new(addr, dialer, options.retry)),
            metrics: Arc::new(Metrics::new()),
            options,
        }
    }

    /// Transcribe a file the backend can read from the shared filesystem.
    ///
    /// `path` is canonicalized first; a path that does not exist fails with
    /// [`RpcError::InvalidPath`] before any network I/O.
    pub async fn transcribe_path(
        &self,
        path: impl AsRef<Path>,
        model: &str,
        language: Option<&str>,
        task: Task,
    ) -> Result<TranscriptionResponse, RpcError> {
        let audio_path = resolve_audio_path(path.as_ref()).await?;
        let request = Request::transcribe(AudioSource::Path { audio_path }, model, language, task);
        self.call(request).await
    }

    /// Transcribe in-memory audio; the bytes travel base64-encoded.
    pub async fn transcribe_bytes(
        &self,
        data: &[u8],
        model: &str,
        language: Option<&str>,
        task: Task,
    ) -> Result<TranscriptionResponse, RpcError> {
        let audio_data = base64::engine::general_purpose::STANDARD.encode(data);
        let request = Request::transcribe(AudioSource::Data { audio_data }, model, language, task);
        self.call(request).await
    }

    /// Models the backend offers and the ones it has loaded.
    pub async fn list_models(&self) -> Result<ModelsResponse, RpcError> {
        self.call(Request::ListModels).await
    }

    /// [`transcribe_path`](Self::transcribe_path), unless `cancel` has already fired.
    ///
    /// The token is consulted once, at entry.
    pub async fn transcribe_path_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: impl AsRef<Path>,
        model: &str,
        language: Option<&str>,
        task: Task,
    ) -> Result<TranscriptionResponse, RpcError> {
        if cancel.is_cancelled() {
            return Err(RpcError::Cancelled);
        }
        self.transcribe_path(path, model, language, task).await
    }

    /// [`transcribe_bytes`](Self::transcribe_bytes), unless `cancel` has already fired.
    pub async fn transcribe_bytes_with_cancel(
        &self,
        cancel: &CancellationToken,
        data: &[u8],
        model: &str,
        language: Option<&str>,
        task: Task,
    ) -> Result<TranscriptionResponse, RpcError> {
        if cancel.is_cancelled() {
            return Err(RpcError::Cancelled);
        }
        self.transcribe_bytes(data, model, language, task).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether a connection is currently held. Waits for in-flight calls.
    pub async fn is_connected(&self) -> bool {
        self.conn.acquire().await.is_connected()
    }

    /// Drop the connection after any in-flight call finishes. The next call
    /// dials again.
    pub async fn close(&self) {
        self.conn.acquire().await.close();
    }

    async fn call<R>(&self, request: Request) -> Result<R, RpcError>
    where
        R: DeserializeOwned + Reply + Send + 'static,
    {
        let command = request.command();
        let payload =
            serde_json::to_vec(&request).map_err(|e| RpcError::Serialize(e.to_string()))?;

        let started = Instant::now();
        let guard = self.conn.acquire().await;

        let metrics = Arc::clone(&self.metrics);
        let options = self.options;
        let task = tokio::spawn(async move {
            let raw = exchange(guard, &payload, &options).await;
            let result = raw.and_then(|raw| decode::<R>(&raw));

            let elapsed = started.elapsed();
            metrics.record(elapsed, result.is_err());
            match &result {
                Ok(_) => log::debug!("{command} succeeded in {elapsed:?}"),
                Err(e) => log::warn!("{command} failed after {elapsed:?}: {e}"),
            }
            result
        });

        task.await
            .map_err(|e| RpcError::Io(std::io::Error::other(format!("{command} task failed: {e}"))))?
    }
}

/// One round trip under the serializer. The guard is released on return,
/// before the payload is decoded.
async fn exchange<D: Dialer>(
    mut guard: AccessGuard<ConnectionManager<D>>,
    payload: &[u8],
    options: &ClientOptions,
) -> Result<Vec<u8>, RpcError> {
    let stream = guard.ensure().await?;
    let result = write_then_read(stream, payload, options).await;
    if result.is_err() {
        // The stream may hold a partial frame; never reuse it.
        guard.close();
    }
    result
}

async fn write_then_read<S>(
    stream: &mut S,
    payload: &[u8],
    options: &ClientOptions,
) -> Result<Vec<u8>, RpcError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    tokio::time::timeout(options.write_timeout, write_frame(stream, payload))
        .await
        .map_err(|_| RpcError::Timeout { stage: TimeoutStage::Write })??;

    tokio::time::timeout(options.read_timeout, read_frame(stream, options.max_response_bytes))
        .await
        .map_err(|_| RpcError::Timeout { stage: TimeoutStage::Read })?
}

fn decode<R: DeserializeOwned + Reply>(raw: &[u8]) -> Result<R, RpcError> {
    let reply: R = serde_json::from_slice(raw)
        .map_err(|e| RpcError::Protocol(format!("invalid response payload: {e}")))?;
    if let Some(error) = reply.error() {
        return Err(RpcError::Application(error.to_owned()));
    }
    Ok(reply)
}

async fn resolve_audio_path(path: &Path) -> Result<String, RpcError> {
    let invalid = |source| RpcError::InvalidPath {
        path: path.to_path_buf(),
        source,
    };
    let absolute = tokio::fs::canonicalize(path).await.map_err(invalid)?;
    absolute.into_os_string().into_string().map_err(|_| {
        invalid(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "path is not valid UTF-8",
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

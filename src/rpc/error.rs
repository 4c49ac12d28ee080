//! Error taxonomy for calls to the transcription backend.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// TimeoutStage
// ---------------------------------------------------------------------------

/// Which phase of a call ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    Connect,
    Write,
    Read,
}

impl std::fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimeoutStage::Connect => "connect",
            TimeoutStage::Write => "write",
            TimeoutStage::Read => "read",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// RpcError
// ---------------------------------------------------------------------------

/// All errors a [`WhisperClient`](crate::rpc::WhisperClient) call can return.
///
/// Nothing here is retried automatically apart from dialing, which has its own
/// bounded budget. The gateway decides whether to retry the whole operation;
/// [`RpcError::is_retryable`] is the hint for that decision.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Every dial attempt failed and the last one was refused or errored
    /// rather than timing out. No connection is held.
    #[error("could not connect to transcription backend at {addr} after {attempts} attempts: {source}")]
    Connection {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// Write or read failed on an established connection. The connection has
    /// been dropped and the next call dials again.
    #[error("backend I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backend sent something that is not a valid frame or payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backend answered with a non-empty `error` field.
    #[error("backend error: {0}")]
    Application(String),

    /// A deadline elapsed while dialing, writing or reading. `Connect` is only
    /// reported once the whole dial budget is spent.
    #[error("{stage} timed out")]
    Timeout { stage: TimeoutStage },

    /// The audio path could not be resolved locally; nothing was sent.
    #[error("cannot resolve audio path {}: {source}", path.display())]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The caller cancelled before the call was queued.
    #[error("call cancelled before it was sent")]
    Cancelled,

    /// The request could not be encoded as JSON.
    #[error("failed to encode request: {0}")]
    Serialize(String),
}

impl RpcError {
    /// Whether repeating the whole logical call might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::Connection { .. } | RpcError::Io(_) | RpcError::Timeout { .. }
        )
    }

    /// Whether this failure happened on the wire after the connection was up,
    /// which means the connection was torn down.
    ///
    /// An oversized frame header also drops the connection but surfaces as
    /// [`RpcError::Protocol`], which is not reported here because payload
    /// decode failures share that variant and leave the connection intact.
    pub fn tears_down_connection(&self) -> bool {
        match self {
            RpcError::Io(_) => true,
            RpcError::Timeout { stage } => *stage != TimeoutStage::Connect,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")
    }

    /// Verify which errors hint that retrying the call may help.
    #[test]
    fn retryable_classification() {
        assert!(RpcError::Io(io_err()).is_retryable());
        assert!(RpcError::Timeout { stage: TimeoutStage::Read }.is_retryable());
        assert!(RpcError::Connection {
            addr: "127.0.0.1:9000".into(),
            attempts: 3,
            source: io_err(),
        }
        .is_retryable());

        assert!(!RpcError::Application("model not found".into()).is_retryable());
        assert!(!RpcError::Protocol("bad json".into()).is_retryable());
        assert!(!RpcError::Cancelled.is_retryable());
    }

    /// Verify which errors imply the connection was dropped.
    #[test]
    fn teardown_classification() {
        assert!(RpcError::Io(io_err()).tears_down_connection());
        assert!(RpcError::Timeout { stage: TimeoutStage::Write }.tears_down_connection());
        assert!(!RpcError::Timeout { stage: TimeoutStage::Connect }.tears_down_connection());
        assert!(!RpcError::Application("x".into()).tears_down_connection());
    }

    /// Verify that messages carry the details of the failure.
    #[test]
    fn display_includes_details() {
        let e = RpcError::Application("model not found".into());
        assert_eq!(e.to_string(), "backend error: model not found");

        let e = RpcError::Timeout { stage: TimeoutStage::Read };
        assert_eq!(e.to_string(), "read timed out");

        let e = RpcError::Connection {
            addr: "10.0.0.1:9000".into(),
            attempts: 3,
            source: io_err(),
        };
        assert!(e.to_string().contains("10.0.0.1:9000"));
        assert!(e.to_string().contains("3 attempts"));
    }
}

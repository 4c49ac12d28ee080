//! Length-prefixed frame codec.
//!
//! ```text
//! frame := length (8 bytes, big-endian u64) || payload (length bytes)
//! ```
//!
//! The codec is content-agnostic; the façade puts JSON in the payload.  A
//! frame is always buffered whole before it is handed upward; there is no
//! streaming decode.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::rpc::error::RpcError;

/// Size of the length prefix in bytes.
pub const HEADER_SIZE: usize = 8;

/// Prepend the 8-byte big-endian length prefix to `payload`.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Write one frame carrying `payload` and flush the stream.
///
/// The header and the payload are written separately so large payloads are
/// never copied.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&(payload.len() as u64).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one frame and return its payload.
///
/// A stream that closes before the header or the full payload arrives is an
/// I/O error (`UnexpectedEof`). A length prefix above `max_len` is rejected
/// as a protocol error before anything is allocated.
pub async fn read_frame<R>(reader: &mut R, max_len: u64) -> Result<Vec<u8>, RpcError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let len = u64::from_be_bytes(header);
    if len > max_len {
        return Err(RpcError::Protocol(format!(
            "frame length {len} exceeds limit of {max_len} bytes"
        )));
    }
    let len = usize::try_from(len)
        .map_err(|_| RpcError::Protocol(format!("frame length {len} does not fit in memory")))?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Transport client for the transcription backend.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    WhisperClient (façade)                  │
//! │  transcribe_path · transcribe_bytes · list_models · close  │
//! │                                                            │
//! │   ┌────────────────────┐        ┌──────────────────────┐   │
//! │   │  AccessSerializer  │        │       Metrics        │   │
//! │   │  one call at a time│        │  atomic, lock-free   │   │
//! │   └─────────┬──────────┘        └──────────────────────┘   │
//! │             ▼                                              │
//! │   ┌────────────────────┐        ┌──────────────────────┐   │
//! │   │ ConnectionManager  │──────▶ │  codec (8-byte BE    │   │
//! │   │ dial · retry · drop│        │  length + JSON)      │   │
//! │   └────────────────────┘        └──────────────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! One client owns one TCP connection. Calls never share it concurrently:
//! a second call waits until the first has read its response (or failed).

pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod messages;
pub mod metrics;
pub mod serializer;

#[cfg(test)]
pub(crate) mod test_support;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use client::{ClientOptions, WhisperClient, DEFAULT_MAX_RESPONSE_BYTES};
pub use codec::{encode_frame, read_frame, write_frame, HEADER_SIZE};
pub use connection::{ConnectionManager, Dialer, RetryPolicy, TcpDialer};
pub use error::{RpcError, TimeoutStage};
pub use messages::{
    normalize_language, AudioSource, ModelsResponse, Reply, Request, Segment, Task,
    TranscriptionResponse,
};
pub use metrics::{Metrics, MetricsSnapshot};
pub use serializer::{AccessGuard, AccessSerializer};

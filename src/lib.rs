//! Whisper gateway: the transport client between an HTTP front end and a
//! long-running Whisper transcription backend.
//!
//! * [`rpc`]: framed TCP client ([`rpc::WhisperClient`]) with connection
//!   lifecycle, call serialization and metrics.
//! * [`config`]: [`config::GatewayConfig`] loaded from TOML and `WHISPER_*`
//!   environment variables.

pub mod config;
pub mod rpc;

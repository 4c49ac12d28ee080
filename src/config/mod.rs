//! Configuration module for the Whisper gateway.
//!
//! Provides `GatewayConfig` (top-level settings), sub-configs for the backend
//! connection and the HTTP front end, `AppPaths` for the platform config
//! directory, and TOML persistence with `WHISPER_*` environment overrides.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{BackendConfig, GatewayConfig, RequestDefaults, ServerConfig};

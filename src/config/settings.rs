//! Gateway settings structs, defaults, TOML persistence and environment
//! overrides.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::rpc::{RetryPolicy, Task};

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Where the transcription backend listens and how patiently we talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend host name or IP address.
    pub host: String,
    /// Backend TCP port.
    pub port: u16,
    /// Upper bound for a single dial attempt, in seconds.
    pub connect_timeout_secs: u64,
    /// Upper bound for writing one request frame, in seconds.
    pub write_timeout_secs: u64,
    /// Upper bound for reading one response frame, in seconds.
    ///
    /// Transcription of long recordings is slow on CPU, so this defaults to
    /// thirty minutes.
    pub read_timeout_secs: u64,
    /// Dial attempts before a connection error is reported.
    pub max_dial_attempts: u32,
    /// Pause between two failed dial attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9000,
            connect_timeout_secs: 5,
            write_timeout_secs: 5,
            read_timeout_secs: 30 * 60,
            max_dial_attempts: 3,
            retry_backoff_ms: 2_000,
        }
    }
}

impl BackendConfig {
    /// `host:port` string suitable for dialing.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Dial retry budget derived from this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_dial_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Settings read by the HTTP front end that embeds the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the HTTP gateway binds to.
    pub port: u16,
    /// Largest accepted multipart upload, in bytes.
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            max_upload_bytes: 20 << 20,
        }
    }
}

// ---------------------------------------------------------------------------
// RequestDefaults
// ---------------------------------------------------------------------------

/// Form-parameter fallbacks applied when an upload omits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    /// Whisper model name (`"tiny"`, `"base"`, …).
    pub model: String,
    /// Task sent when none is given.
    pub task: Task,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            model: "base".into(),
            task: Task::Transcribe,
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level gateway configuration, serialised as `gateway.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use whisper_gateway::config::GatewayConfig;
///
/// // Load (returns Default when file is missing), then apply WHISPER_* env vars
/// let config = GatewayConfig::load().unwrap();
/// println!("backend at {}", config.backend.addr());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Transcription backend connection settings.
    pub backend: BackendConfig,
    /// HTTP front-end settings.
    pub server: ServerConfig,
    /// Per-request fallbacks.
    pub defaults: RequestDefaults,
}

impl GatewayConfig {
    /// Load configuration from the platform-appropriate `gateway.toml` and
    /// apply environment overrides.
    ///
    /// Returns the defaults (plus overrides) when the file does not exist yet,
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppPaths::new().settings_file)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from an explicit path without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override fields from `WHISPER_HOST`, `WHISPER_PORT` and `SERVER_PORT`.
    ///
    /// `lookup` abstracts the environment so tests never mutate process
    /// state. Unset and empty variables leave the current value untouched.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = non_empty("WHISPER_HOST") {
            self.backend.host = host;
        }
        if let Some(port) = non_empty("WHISPER_PORT") {
            self.backend.port = port
                .parse()
                .with_context(|| format!("WHISPER_PORT is not a valid port: {port:?}"))?;
        }
        if let Some(port) = non_empty("SERVER_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("SERVER_PORT is not a valid port: {port:?}"))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    /// Verify default values match the documented defaults.
    #[test]
    fn default_values() {
        let cfg = GatewayConfig::default();

        assert_eq!(cfg.backend.addr(), "127.0.0.1:9000");
        assert_eq!(cfg.backend.connect_timeout_secs, 5);
        assert_eq!(cfg.backend.max_dial_attempts, 3);
        assert_eq!(cfg.backend.retry_backoff_ms, 2_000);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(cfg.defaults.model, "base");
        assert_eq!(cfg.defaults.task, Task::Transcribe);
    }

    /// Verify that the retry policy is derived from the backend section.
    #[test]
    fn retry_policy_mirrors_backend_config() {
        let policy = BackendConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_secs(2));
        assert_eq!(policy.connect_timeout, Duration::from_secs(5));
    }

    /// A configured budget of zero dials still dials once.
    #[test]
    fn zero_dial_attempts_is_clamped_to_one() {
        let backend = BackendConfig {
            max_dial_attempts: 0,
            ..BackendConfig::default()
        };
        assert_eq!(backend.retry_policy().max_attempts, 1);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = GatewayConfig::load_from(&path).expect("should not error");
        assert_eq!(config, GatewayConfig::default());
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("gateway.toml");

        let mut cfg = GatewayConfig::default();
        cfg.backend.host = "whisper.internal".into();
        cfg.backend.port = 9100;
        cfg.backend.read_timeout_secs = 60;
        cfg.defaults.task = Task::Translate;

        cfg.save_to(&path).expect("save");
        let loaded = GatewayConfig::load_from(&path).expect("load");

        assert_eq!(loaded, cfg);
    }

    /// A file that sets only some keys gets defaults for the rest.
    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[backend]\nport = 9999\n").expect("write");

        let loaded = GatewayConfig::load_from(&path).expect("load");
        assert_eq!(loaded.backend.port, 9999);
        assert_eq!(loaded.backend.host, "127.0.0.1");
        assert_eq!(loaded.server, ServerConfig::default());
    }

    /// Verify that `WHISPER_*` and `SERVER_PORT` override file values.
    #[test]
    fn env_overrides_apply() {
        let mut cfg = GatewayConfig::default();
        cfg.apply_env_overrides(env(&[
            ("WHISPER_HOST", "10.0.0.7"),
            ("WHISPER_PORT", "9001"),
            ("SERVER_PORT", "8081"),
        ]))
        .expect("overrides");

        assert_eq!(cfg.backend.addr(), "10.0.0.7:9001");
        assert_eq!(cfg.server.port, 8081);
    }

    /// Empty environment values leave the configured value untouched.
    #[test]
    fn empty_env_values_are_ignored() {
        let mut cfg = GatewayConfig::default();
        cfg.apply_env_overrides(env(&[("WHISPER_HOST", ""), ("WHISPER_PORT", "")]))
            .expect("overrides");
        assert_eq!(cfg.backend, BackendConfig::default());
    }

    /// A non-numeric port in the environment is an error, not a silent default.
    #[test]
    fn invalid_port_is_an_error() {
        let mut cfg = GatewayConfig::default();
        let err = cfg
            .apply_env_overrides(env(&[("WHISPER_PORT", "ninety")]))
            .unwrap_err();
        assert!(err.to_string().contains("WHISPER_PORT"));
    }
}

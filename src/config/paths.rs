//! Cross-platform gateway paths using the `dirs` crate.
//!
//! Config dir:
//!   Windows: %APPDATA%\whisper-gateway\
//!   macOS:   ~/Library/Application Support/whisper-gateway/
//!   Linux:   ~/.config/whisper-gateway/

use std::path::PathBuf;

/// Holds all resolved gateway directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `gateway.toml`.
    pub config_dir: PathBuf,
    /// Full path to `gateway.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "whisper-gateway";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard config path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let settings_file = config_dir.join("gateway.toml");

        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify that the settings file sits inside the app config directory.
    #[test]
    fn settings_file_lives_in_config_dir() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.ends_with("whisper-gateway"));
        assert_eq!(paths.settings_file.parent(), Some(paths.config_dir.as_path()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "gateway.toml"));
    }
}

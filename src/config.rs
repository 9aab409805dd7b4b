//! Configuration file parser for ~/.config/rivulet/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde, though we log a warning when
//! the file contains potential typos.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::sanitize::SanitizeMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP surface binds to for `rivulet serve`.
    pub listen: String,

    /// HTML sanitization strategy applied at render boundaries.
    /// `"strict"` (allow-list) or `"passthrough"`.
    pub sanitize: SanitizeMode,

    /// Overrides the default data directory (~/.config/rivulet).
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
            sanitize: SanitizeMode::Strict,
            data_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to flag likely typos
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["listen", "sanitize", "data_dir"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), listen = %config.listen, "Loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen, "127.0.0.1:3000");
        assert_eq!(config.sanitize, SanitizeMode::Strict);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/rivulet_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.listen, "127.0.0.1:3000");
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sanitize, SanitizeMode::Strict);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "listen = \"0.0.0.0:8080\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.sanitize, SanitizeMode::Strict); // default
    }

    #[test]
    fn test_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let content = r#"
listen = "127.0.0.1:9000"
sanitize = "passthrough"
data_dir = "/tmp/rivulet-data"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.sanitize, SanitizeMode::Passthrough);
        assert_eq!(config.data_dir.as_deref(), Some(Path::new("/tmp/rivulet-data")));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "listen = \"127.0.0.1:3000\"\ntotally_fake_key = 42\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen, "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_sanitize_mode_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sanitize = \"yolo\"\n").unwrap();

        assert!(Config::load(&path).is_err());
    }
}

//! Listener configuration for the admin and mock surfaces.
//!
//! The configuration is a flat record persisted as JSON (or YAML when the
//! file name says so). A missing file means defaults; a present file
//! overrides only the fields it sets to a non-null value.

mod protocol;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub use protocol::Protocol;

pub const DEFAULT_ADMIN_PORT: u16 = 5174;
pub const DEFAULT_MOCK_PORT: u16 = 5175;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("config I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub admin_protocol: Protocol,
    pub admin_port: u16,
    pub mock_protocol: Protocol,
    pub mock_port: u16,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            admin_protocol: Protocol::Http,
            admin_port: DEFAULT_ADMIN_PORT,
            mock_protocol: Protocol::Http,
            mock_port: DEFAULT_MOCK_PORT,
            ssl_cert: None,
            ssl_key: None,
        }
    }
}

/// Partial configuration: every field is optional and `null` means "keep".
///
/// Used both for config files and for settings updates from the admin API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    pub admin_protocol: Option<String>,
    pub admin_port: Option<u16>,
    pub mock_protocol: Option<String>,
    pub mock_port: Option<u16>,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl ServerConfig {
    /// Load configuration, falling back to defaults when the file is
    /// missing, unreadable or invalid
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::default();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let overrides: ConfigOverrides = if is_yaml(path) {
            serde_yaml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };
        config.apply(overrides)?;
        Ok(config)
    }

    /// Overlay every field the overrides set. Blank TLS paths clear the
    /// current value.
    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(p) = overrides.admin_protocol {
            self.admin_protocol = Protocol::from_scheme(&p).map_err(ConfigError::Invalid)?;
        }
        if let Some(p) = overrides.mock_protocol {
            self.mock_protocol = Protocol::from_scheme(&p).map_err(ConfigError::Invalid)?;
        }
        if let Some(port) = overrides.admin_port {
            self.admin_port = port;
        }
        if let Some(port) = overrides.mock_port {
            self.mock_port = port;
        }
        if let Some(cert) = overrides.ssl_cert {
            self.ssl_cert = non_empty(cert);
        }
        if let Some(key) = overrides.ssl_key {
            self.ssl_key = non_empty(key);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_port == 0 || self.mock_port == 0 {
            return Err(ConfigError::Invalid("ports must be non-zero".into()));
        }
        Ok(())
    }

    /// Certificate and key paths, when both are configured
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.ssl_cert, &self.ssl_key) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The persisted configuration as seen and edited through the admin API.
///
/// Saved changes only take effect for listeners on the next start.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<ServerConfig>,
}

impl SettingsStore {
    pub fn new(path: PathBuf, config: ServerConfig) -> Self {
        Self {
            path,
            current: RwLock::new(config),
        }
    }

    pub fn current(&self) -> ServerConfig {
        self.current.read().clone()
    }

    /// Apply overrides, persist the result, and return it
    pub fn update(&self, overrides: ConfigOverrides) -> Result<ServerConfig, ConfigError> {
        let mut current = self.current.write();
        let mut next = current.clone();
        next.apply(overrides)?;
        next.save(&self.path)?;
        *current = next.clone();
        info!("Saved settings to {}", self.path.display());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(dir.path().join("config.json"));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.admin_port, 5174);
        assert_eq!(config.mock_port, 5175);
        assert_eq!(config.admin_protocol, Protocol::Http);
        assert!(config.tls_paths().is_none());
    }

    #[test]
    fn test_partial_file_overrides_only_set_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"mock_protocol": "https", "mock_port": 9443, "admin_port": null, "ssl_cert": "c.pem"}"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path);
        assert_eq!(config.mock_protocol, Protocol::Https);
        assert_eq!(config.mock_port, 9443);
        assert_eq!(config.admin_port, 5174);
        assert_eq!(config.ssl_cert.as_deref(), Some("c.pem"));
        assert!(config.tls_paths().is_none());
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "admin_port: 8000\nssl_cert: c.pem\nssl_key: k.pem\n").unwrap();

        let config = ServerConfig::load(&path);
        assert_eq!(config.admin_port, 8000);
        assert_eq!(config.tls_paths(), Some(("c.pem", "k.pem")));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ServerConfig::load(&path), ServerConfig::default());
        assert!(ServerConfig::try_load(&path).is_err());
    }

    #[test]
    fn test_apply_rejects_unknown_protocol() {
        let mut config = ServerConfig::default();
        let result = config.apply(ConfigOverrides {
            admin_protocol: Some("gopher".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_settings_update_persists_and_clears_tls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let settings = SettingsStore::new(
            path.clone(),
            ServerConfig {
                ssl_cert: Some("c.pem".into()),
                ..Default::default()
            },
        );

        let saved = settings
            .update(ConfigOverrides {
                admin_protocol: Some("HTTPS".into()),
                ssl_cert: Some("".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(saved.admin_protocol, Protocol::Https);
        assert!(saved.ssl_cert.is_none());
        assert_eq!(settings.current(), saved);
        assert_eq!(ServerConfig::load(&path), saved);
    }

    #[test]
    fn test_settings_update_rejects_invalid_without_saving() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let settings = SettingsStore::new(path.clone(), ServerConfig::default());

        assert!(settings
            .update(ConfigOverrides {
                mock_port: Some(0),
                ..Default::default()
            })
            .is_err());
        assert!(!path.exists());
        assert_eq!(settings.current(), ServerConfig::default());
    }
}

//! Configuration module
//!
//! `AppConfig` is read from a TOML file; every key is optional and falls
//! back to the defaults below.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9000
//! heartbeat_interval = 60
//!
//! [auto_start]
//! enabled = true
//! delay_ms = 1000
//! id_tag = "anonymous"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::handlers::ProtocolSettings;
use crate::application::services::AutoStartSettings;
use crate::infrastructure::database::DatabaseConfig;
use crate::support::errors::ConfigError;

const APP_DIR: &str = "ocpp-central";

/// `<config_dir>/ocpp-central/config.toml`, or `./config.toml` when the
/// platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub auto_start: AutoStartConfig,
    pub metrics: MetricsConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// WebSocket listener and protocol timing. Durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Returned in BootNotification.
    pub heartbeat_interval: u64,
    pub call_timeout: u64,
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            heartbeat_interval: 60,
            call_timeout: 30,
            shutdown_timeout: 10,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file, created if missing.
    pub path: String,
    /// Keep everything in process memory instead.
    pub in_memory: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "ocpp-central.db".to_string(),
            in_memory: false,
        }
    }
}

impl DatabaseSettings {
    pub fn connection(&self) -> DatabaseConfig {
        DatabaseConfig::sqlite(&self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoStartConfig {
    pub enabled: bool,
    pub delay_ms: u64,
    pub id_tag: String,
}

impl Default for AutoStartConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: 1000,
            id_tag: "anonymous".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus scrape port; no exporter when unset.
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.heartbeat_interval == 0 {
            return Err(ConfigError::Invalid(
                "server.heartbeat_interval must be at least 1 second".into(),
            ));
        }
        if self.server.call_timeout == 0 {
            return Err(ConfigError::Invalid(
                "server.call_timeout must be at least 1 second".into(),
            ));
        }
        if self.auto_start.id_tag.is_empty() || self.auto_start.id_tag.len() > 20 {
            return Err(ConfigError::Invalid(
                "auto_start.id_tag must be 1 to 20 characters".into(),
            ));
        }
        Ok(())
    }

    pub fn protocol_settings(&self) -> ProtocolSettings {
        ProtocolSettings {
            heartbeat_interval: Duration::from_secs(self.server.heartbeat_interval),
            call_timeout: Duration::from_secs(self.server.call_timeout),
            auto_start: AutoStartSettings {
                enabled: self.auto_start.enabled,
                delay: Duration::from_millis(self.auto_start.delay_ms),
                id_tag: self.auto_start.id_tag.clone(),
            },
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.address(), "0.0.0.0:9000");
        assert_eq!(config.server.heartbeat_interval, 60);
        assert!(!config.auto_start.enabled);
        assert_eq!(config.metrics.port, None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::parse(
            r#"
            [server]
            port = 9100

            [auto_start]
            enabled = true
            delay_ms = 250

            [metrics]
            port = 9464
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.auto_start.enabled);
        assert_eq!(config.auto_start.id_tag, "anonymous");
        assert_eq!(config.metrics.port, Some(9464));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn protocol_settings_convert_units() {
        let mut config = AppConfig::default();
        config.server.heartbeat_interval = 120;
        config.auto_start.delay_ms = 1500;

        let settings = config.protocol_settings();
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(120));
        assert_eq!(settings.call_timeout, Duration::from_secs(30));
        assert_eq!(settings.auto_start.delay, Duration::from_millis(1500));
    }

    #[test]
    fn zero_heartbeat_interval_is_invalid() {
        let mut config = AppConfig::default();
        config.server.heartbeat_interval = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("ocpp-central-missing-config.toml");
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = std::env::temp_dir().join(format!(
            "ocpp-central-bad-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[server\nport = 1").unwrap();
        let result = AppConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}

// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Configuration module

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Log level used when RUST_LOG is not set
    pub log_level: String,

    /// Synthetic generator configuration
    pub generator: GeneratorConfig,

    /// Streaming configuration
    pub streaming: StreamingConfig,

    /// Database configuration
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "AgroTrack".to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            generator: GeneratorConfig::default(),
            streaming: StreamingConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("agrotrack"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Point the database at a new data directory
    pub fn set_data_dir(&mut self, data_dir: PathBuf) {
        self.database.path = data_dir.join("agrotrack.db");
        self.data_dir = data_dir;
    }
}

/// Synthetic field generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Run the generator alongside real ingestion
    pub enabled: bool,

    /// Seconds between ticks
    pub interval_secs: u64,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,

    /// Sensor id reported in logs
    pub sensor_id: String,
}

impl GeneratorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 5,
            seed: None,
            sensor_id: "field-sim-1".to_string(),
        }
    }
}

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Per-subscriber event queue depth
    pub subscriber_queue_capacity: usize,

    /// Enable WebSocket server
    pub websocket_enabled: bool,
    pub websocket_port: u16,
    pub websocket_max_clients: usize,

    /// Enable MQTT ingestion
    pub mqtt_enabled: bool,
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_topic: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: 256,

            websocket_enabled: true,
            websocket_port: 8765,
            websocket_max_clients: 64,

            mqtt_enabled: false,
            mqtt_broker: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_client_id: "agrotrack".to_string(),
            mqtt_topic: "agrotrack/sensors/+/readings".to_string(),
            mqtt_username: None,
            mqtt_password: None,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database path
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/agrotrack.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            log_level = "debug"

            [generator]
            enabled = true
            interval_secs = 2
        "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert!(config.generator.enabled);
        assert_eq!(config.generator.interval(), Duration::from_secs(2));
        assert_eq!(config.streaming.websocket_port, 8765);
        assert_eq!(config.database.path, PathBuf::from("./data/agrotrack.db"));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("agrotrack-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.generator.interval_secs, created.generator.interval_secs);
        assert_eq!(loaded.streaming.mqtt_topic, created.streaming.mqtt_topic);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let generator = GeneratorConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(generator.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_set_data_dir_moves_database() {
        let mut config = Config::default();
        config.set_data_dir(PathBuf::from("/var/lib/agrotrack"));
        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/agrotrack/agrotrack.db")
        );
    }
}

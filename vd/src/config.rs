//! Configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bus::EventBusConfig;

/// Main voxd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event bus sizing and retry behavior
    #[serde(rename = "event-bus")]
    pub event_bus: EventBusSettings,

    /// State store location and pooling
    pub database: DatabaseSettings,

    /// Dialog and policy limits
    pub dialog: DialogSettings,

    /// Policy engine options
    pub policy: PolicySettings,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .voxd.yml
        let local_config = PathBuf::from(".voxd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/voxd/voxd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("voxd").join("voxd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Event bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusSettings {
    /// Maximum queued events before publishers block
    pub capacity: usize,

    /// Concurrent delivery workers
    pub workers: usize,

    /// Delivery attempts before dead-lettering
    #[serde(rename = "max-retry-attempts")]
    pub max_retry_attempts: u32,

    /// Pause between delivery attempts
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Dead-letter sweep period
    #[serde(rename = "dead-letter-sweep-secs")]
    pub dead_letter_sweep_secs: u64,
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            workers: 4,
            max_retry_attempts: 3,
            retry_delay_ms: 1000,
            dead_letter_sweep_secs: 30,
        }
    }
}

impl EventBusSettings {
    /// Convert into the bus runtime configuration
    pub fn to_bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            capacity: self.capacity,
            workers: self.workers,
            max_retry_attempts: self.max_retry_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            dead_letter_sweep_interval: Duration::from_secs(self.dead_letter_sweep_secs),
        }
    }
}

/// State store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file
    pub path: PathBuf,

    /// Maximum concurrent connections
    #[serde(rename = "pool-size")]
    pub pool_size: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/vox.db"),
            pool_size: 5,
        }
    }
}

/// Dialog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogSettings {
    /// Maximum response length enforced by policy
    #[serde(rename = "max-response-length")]
    pub max_response_length: usize,

    /// Maximum input length enforced by policy
    #[serde(rename = "max-input-length")]
    pub max_input_length: usize,

    /// Optional intent patterns file; embedded defaults when absent
    #[serde(rename = "intent-patterns")]
    pub intent_patterns: Option<PathBuf>,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            max_response_length: 500,
            max_input_length: 1000,
            intent_patterns: None,
        }
    }
}

/// Policy engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Override for the banned-word list
    #[serde(rename = "banned-words")]
    pub banned_words: Option<Vec<String>>,

    /// Audit log path; auditing is disabled when absent
    #[serde(rename = "audit-log")]
    pub audit_log: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behavior() {
        let config = Config::default();
        assert_eq!(config.event_bus.capacity, 1000);
        assert_eq!(config.event_bus.max_retry_attempts, 3);
        assert_eq!(config.event_bus.retry_delay_ms, 1000);
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.dialog.max_response_length, 500);
    }

    #[test]
    fn test_load_from_yaml() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("voxd.yml");
        std::fs::write(
            &path,
            "event-bus:\n  capacity: 64\n  max-retry-attempts: 5\ndatabase:\n  pool-size: 2\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.event_bus.capacity, 64);
        assert_eq!(config.event_bus.max_retry_attempts, 5);
        assert_eq!(config.database.pool_size, 2);
        // unspecified sections keep defaults
        assert_eq!(config.dialog.max_response_length, 500);
    }

    #[test]
    fn test_load_invalid_explicit_path_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_to_bus_config() {
        let settings = EventBusSettings {
            retry_delay_ms: 250,
            ..Default::default()
        };
        let bus_config = settings.to_bus_config();
        assert_eq!(bus_config.retry_delay, Duration::from_millis(250));
        assert_eq!(bus_config.capacity, 1000);
    }
}

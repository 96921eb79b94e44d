//! devicecoord configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;
use crate::dispatch::DispatchConfig;
use crate::monitor::MonitoringConfig;
use crate::timeout::TimeoutConfig;

/// Main devicecoord configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Admission control
    pub coordinator: CoordinatorConfig,

    /// Per-operation deadlines
    pub timeouts: TimeoutConfig,

    /// Resource monitor thresholds and intervals
    pub monitoring: MonitoringConfig,

    /// Property update dispatch
    pub dispatch: DispatchConfig,

    /// Storage locations
    pub storage: StorageConfig,

    /// Log level used when none is given on the command line
    #[serde(rename = "log-level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            timeouts: TimeoutConfig::default(),
            monitoring: MonitoringConfig::default(),
            dispatch: DispatchConfig::default(),
            storage: StorageConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.devicecoord.yml`, then
    /// `~/.config/devicecoord/devicecoord.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".devicecoord.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("devicecoord").join("devicecoord.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

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

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Device group file
    #[serde(rename = "groups-file")]
    pub groups_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/devicecoord on Linux)
        let groups_file = dirs::data_dir()
            .map(|d| d.join("devicecoord"))
            .unwrap_or_else(|| PathBuf::from(".devicecoord"))
            .join("groups.json")
            .to_string_lossy()
            .into_owned();

        Self { groups_file }
    }
}

impl StorageConfig {
    pub fn groups_path(&self) -> PathBuf {
        PathBuf::from(&self.groups_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.coordinator.staleness(), Duration::from_secs(600));
        assert_eq!(config.coordinator.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.timeouts.property_update(), Duration::from_secs(60));
        assert_eq!(config.monitoring.queue_usage_threshold, 80.0);
        assert_eq!(config.log_level, "info");
        assert!(config.storage.groups_file.ends_with("groups.json"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
coordinator:
  staleness-ms: 120000
  sweep-interval-ms: 15000

timeouts:
  discovery-ms: 5000
  property-get-ms: 2000

monitoring:
  interval-secs: 30
  task-threshold: 500
  memory-threshold-mb: 256

dispatch:
  base-request-delay-ms: 50

storage:
  groups-file: /var/lib/devicecoord/groups.json

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.coordinator.staleness(), Duration::from_secs(120));
        assert_eq!(config.coordinator.sweep_interval(), Duration::from_secs(15));
        assert_eq!(config.timeouts.discovery(), Duration::from_secs(5));
        assert_eq!(config.timeouts.property_get(), Duration::from_secs(2));
        assert_eq!(config.timeouts.property_set(), Duration::from_secs(10));
        assert_eq!(config.monitoring.task_threshold, 500);
        assert_eq!(config.monitoring.memory_threshold_mb, 256.0);
        assert_eq!(config.dispatch.base_request_delay_ms, 50);
        assert_eq!(config.storage.groups_path(), PathBuf::from("/var/lib/devicecoord/groups.json"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
monitoring:
  interval-secs: 5
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.monitoring.interval_secs, 5);
        assert_eq!(config.monitoring.task_threshold, 1000);
        assert_eq!(config.coordinator.staleness_ms, 600_000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dc.yml");
        fs::write(&path, "log-level: warn\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_load_explicit_path_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}

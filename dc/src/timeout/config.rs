//! Timeout configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named deadlines per operation class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Device discovery deadline in milliseconds
    #[serde(rename = "discovery-ms")]
    pub discovery_ms: u64,

    /// Property read deadline in milliseconds
    #[serde(rename = "property-get-ms")]
    pub property_get_ms: u64,

    /// Property write deadline in milliseconds
    #[serde(rename = "property-set-ms")]
    pub property_set_ms: u64,

    /// Full property refresh deadline in milliseconds
    #[serde(rename = "property-update-ms")]
    pub property_update_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            discovery_ms: 30_000,
            property_get_ms: 10_000,
            property_set_ms: 10_000,
            property_update_ms: 60_000,
        }
    }
}

impl TimeoutConfig {
    pub fn discovery(&self) -> Duration {
        Duration::from_millis(self.discovery_ms)
    }

    pub fn property_get(&self) -> Duration {
        Duration::from_millis(self.property_get_ms)
    }

    pub fn property_set(&self) -> Duration {
        Duration::from_millis(self.property_set_ms)
    }

    pub fn property_update(&self) -> Duration {
        Duration::from_millis(self.property_update_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TimeoutConfig::default();
        assert_eq!(config.discovery(), Duration::from_secs(30));
        assert_eq!(config.property_get(), Duration::from_secs(10));
        assert_eq!(config.property_set(), Duration::from_secs(10));
        assert_eq!(config.property_update(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: TimeoutConfig = serde_yaml::from_str("property-get-ms: 2500").unwrap();
        assert_eq!(config.property_get(), Duration::from_millis(2500));
        assert_eq!(config.discovery(), Duration::from_secs(30));
    }
}

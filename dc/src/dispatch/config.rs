//! Dispatch configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Devices refreshed more recently than this are skipped unless forced
    #[serde(rename = "update-interval-threshold-ms")]
    pub update_interval_threshold_ms: u64,

    /// Base spacing between successive requests to the same address
    #[serde(rename = "base-request-delay-ms")]
    pub base_request_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            update_interval_threshold_ms: 5000,
            base_request_delay_ms: 100,
        }
    }
}

impl DispatchConfig {
    pub fn update_interval_threshold(&self) -> Duration {
        Duration::from_millis(self.update_interval_threshold_ms)
    }

    pub fn base_request_delay(&self) -> Duration {
        Duration::from_millis(self.base_request_delay_ms)
    }
}

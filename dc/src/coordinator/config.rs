//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Age after which an admitted update is presumed abandoned (10 minutes default)
    #[serde(rename = "staleness-ms", default = "default_staleness_ms")]
    pub staleness_ms: u64,

    /// Background sweep interval; half the staleness threshold when unset
    #[serde(rename = "sweep-interval-ms", default)]
    pub sweep_interval_ms: Option<u64>,
}

fn default_staleness_ms() -> u64 {
    debug!("default_staleness_ms: called");
    10 * 60 * 1000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            staleness_ms: default_staleness_ms(),
            sweep_interval_ms: None,
        }
    }
}

impl CoordinatorConfig {
    /// Config with the given staleness threshold and the derived sweep interval
    pub fn with_staleness(staleness: Duration) -> Self {
        Self {
            staleness_ms: staleness.as_millis() as u64,
            sweep_interval_ms: None,
        }
    }

    /// Get the staleness threshold as a Duration
    pub fn staleness(&self) -> Duration {
        Duration::from_millis(self.staleness_ms)
    }

    /// Get the sweep interval as a Duration (never zero)
    pub fn sweep_interval(&self) -> Duration {
        let ms = self.sweep_interval_ms.unwrap_or(self.staleness_ms / 2).max(1);
        debug!(sweep_interval_ms = ms, "CoordinatorConfig::sweep_interval: called");
        Duration::from_millis(ms)
    }
}

//! Monitoring configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default queue-occupancy warning threshold, in percent
pub const DEFAULT_QUEUE_USAGE_THRESHOLD: f64 = 80.0;

/// Resource monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between process samples
    #[serde(rename = "interval-secs")]
    pub interval_secs: u64,

    /// Warn when the runtime has more live tasks than this
    #[serde(rename = "task-threshold")]
    pub task_threshold: usize,

    /// Warn when resident memory exceeds this many MB
    #[serde(rename = "memory-threshold-mb")]
    pub memory_threshold_mb: f64,

    /// Occupancy percentage at which a queue is reported
    #[serde(rename = "queue-usage-threshold")]
    pub queue_usage_threshold: f64,

    /// Seconds between operation-tracker overrun checks
    #[serde(rename = "tracker-check-secs")]
    pub tracker_check_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            task_threshold: 1000,
            memory_threshold_mb: 1000.0,
            queue_usage_threshold: DEFAULT_QUEUE_USAGE_THRESHOLD,
            tracker_check_secs: 10,
        }
    }
}

impl MonitoringConfig {
    /// Get the sampling interval as a Duration (never zero)
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Get the tracker check interval as a Duration (never zero)
    pub fn tracker_check_interval(&self) -> Duration {
        Duration::from_secs(self.tracker_check_secs.max(1))
    }
}

//! Runtime health monitoring
//!
//! A process sampler (live task count, resident memory) and a registry of
//! queue occupancy probes, driven together by [`ResourceMonitor`]. Threshold
//! breaches are reported through logging only.

mod config;
mod process;
mod queue;
mod resource;

pub use config::{DEFAULT_QUEUE_USAGE_THRESHOLD, MonitoringConfig};
pub use process::{ProcessSample, ProcessSampler};
pub use queue::{QueueMonitor, QueueMonitorRegistry, QueueUsage};
pub use resource::ResourceMonitor;

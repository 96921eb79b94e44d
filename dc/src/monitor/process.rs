//! Process-level sampling

use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use super::config::MonitoringConfig;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One reading of process concurrency and memory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSample {
    /// Tasks alive on the current tokio runtime (0 outside a runtime)
    pub alive_tasks: usize,
    /// Runtime worker threads (0 outside a runtime)
    pub workers: usize,
    /// Resident memory of this process in MB (0 when unavailable)
    pub memory_mb: f64,
}

/// Reads task count and memory, warning when either crosses its threshold
pub struct ProcessSampler {
    task_threshold: usize,
    memory_threshold_mb: f64,
    system: Mutex<System>,
    pid: Pid,
}

impl ProcessSampler {
    pub fn new(config: &MonitoringConfig) -> Self {
        debug!(?config, "ProcessSampler::new: called");
        Self {
            task_threshold: config.task_threshold,
            memory_threshold_mb: config.memory_threshold_mb,
            system: Mutex::new(System::new()),
            pid: Pid::from(std::process::id() as usize),
        }
    }

    /// Take one sample. Breaches are logged, never returned as errors.
    pub fn collect_once(&self) -> ProcessSample {
        let (alive_tasks, workers) = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let metrics = handle.metrics();
                (metrics.num_alive_tasks(), metrics.num_workers())
            }
            Err(_) => (0, 0),
        };
        let memory_mb = self.resident_memory_mb();

        info!(alive_tasks, workers, memory_mb, "System metrics");

        if alive_tasks > self.task_threshold {
            warn!(
                count = alive_tasks,
                threshold = self.task_threshold,
                "High task count detected"
            );
        }
        if memory_mb > self.memory_threshold_mb {
            warn!(
                memory_mb,
                threshold_mb = self.memory_threshold_mb,
                "High memory usage detected"
            );
        }

        ProcessSample {
            alive_tasks,
            workers,
            memory_mb,
        }
    }

    fn resident_memory_mb(&self) -> f64 {
        let mut system = self.system.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        system
            .process(self.pid)
            .map(|process| process.memory() as f64 / BYTES_PER_MB)
            .unwrap_or(0.0)
    }
}

//! Periodic resource monitor

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::MonitoringConfig;
use super::process::{ProcessSample, ProcessSampler};
use super::queue::{QueueMonitor, QueueMonitorRegistry, QueueUsage};

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Samples the process and all registered queues on a fixed tick
///
/// Purely observational: breaches are logged and nothing is refused or killed.
pub struct ResourceMonitor {
    config: MonitoringConfig,
    sampler: Arc<ProcessSampler>,
    queues: Arc<RwLock<QueueMonitorRegistry>>,
    running: Option<Running>,
}

impl ResourceMonitor {
    pub fn new(config: MonitoringConfig) -> Self {
        debug!(?config, "ResourceMonitor::new: called");
        Self {
            sampler: Arc::new(ProcessSampler::new(&config)),
            queues: Arc::new(RwLock::new(QueueMonitorRegistry::new())),
            config,
            running: None,
        }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Register a queue, applying the configured usage threshold
    pub async fn add_queue_monitor(&self, monitor: QueueMonitor) {
        let monitor = monitor.with_threshold(self.config.queue_usage_threshold);
        self.queues.write().await.add_monitor(monitor);
    }

    pub async fn queue_count(&self) -> usize {
        self.queues.read().await.len()
    }

    /// On-demand process sample
    pub fn collect_once(&self) -> ProcessSample {
        self.sampler.collect_once()
    }

    /// On-demand check of every registered queue
    pub async fn check_queues(&self) -> Vec<QueueUsage> {
        self.queues.read().await.check_all()
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.handle.is_finished())
    }

    /// Spawn the sampling loop as a child of `parent`
    ///
    /// Returns false if the loop is already running.
    pub fn start(&mut self, parent: &CancellationToken) -> bool {
        if self.is_running() {
            warn!("ResourceMonitor::start: already running");
            return false;
        }

        let period = self.config.interval();
        info!(interval = ?period, "Starting monitoring");

        let token = parent.child_token();
        let loop_token = token.clone();
        let sampler = Arc::clone(&self.sampler);
        let queues = Arc::clone(&self.queues);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sampler.collect_once();
                        queues.read().await.check_all();
                    }
                    _ = loop_token.cancelled() => {
                        info!("Monitoring stopped");
                        break;
                    }
                }
            }
        });

        self.running = Some(Running { token, handle });
        true
    }

    /// Cancel the sampling loop and wait for it to exit. No-op when not started.
    pub async fn stop(&mut self) {
        let Some(Running { token, handle }) = self.running.take() else {
            debug!("ResourceMonitor::stop: not running");
            return;
        };
        token.cancel();
        if let Err(e) = handle.await {
            warn!(error = %e, "Monitoring task ended abnormally");
        }
    }
}

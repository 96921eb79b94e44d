//! Queue occupancy monitoring

use std::fmt;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::config::DEFAULT_QUEUE_USAGE_THRESHOLD;

type Probe = Arc<dyn Fn() -> usize + Send + Sync>;

/// Result of one occupancy check
#[derive(Debug, Clone, PartialEq)]
pub struct QueueUsage {
    pub name: String,
    pub current: usize,
    pub capacity: usize,
    pub percent: f64,
    pub breached: bool,
}

/// Watches one bounded queue through a read-only occupancy probe
///
/// Probes must be cheap and must not block.
#[derive(Clone)]
pub struct QueueMonitor {
    name: String,
    capacity: usize,
    probe: Probe,
    threshold: f64,
}

impl QueueMonitor {
    pub fn new(name: impl Into<String>, capacity: usize, probe: impl Fn() -> usize + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            capacity,
            probe: Arc::new(probe),
            threshold: DEFAULT_QUEUE_USAGE_THRESHOLD,
        }
    }

    /// Override the warning threshold (percent)
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Monitor a bounded mpsc channel without keeping it open
    pub fn for_mpsc<T: Send + 'static>(name: impl Into<String>, sender: &mpsc::Sender<T>) -> Self {
        let capacity = sender.max_capacity();
        let weak = sender.downgrade();
        Self::new(name, capacity, move || {
            weak.upgrade()
                .map(|tx| tx.max_capacity().saturating_sub(tx.capacity()))
                .unwrap_or(0)
        })
    }

    /// Monitor a broadcast channel; occupancy is the backlog of its slowest receiver.
    /// The monitor holds a sender clone.
    pub fn for_broadcast<T: Send + 'static>(
        name: impl Into<String>,
        sender: &broadcast::Sender<T>,
        capacity: usize,
    ) -> Self {
        let sender = sender.clone();
        Self::new(name, capacity, move || sender.len())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Sample the probe and log the occupancy
    pub fn check_usage(&self) -> QueueUsage {
        let current = (self.probe)();
        let percent = occupancy_percent(current, self.capacity);
        let breached = percent >= self.threshold;

        debug!(
            name = %self.name,
            current,
            capacity = self.capacity,
            usage_percent = percent,
            "Queue usage"
        );
        if breached {
            warn!(
                name = %self.name,
                current,
                capacity = self.capacity,
                usage_percent = percent,
                threshold = self.threshold,
                "High queue usage"
            );
        }

        QueueUsage {
            name: self.name.clone(),
            current,
            capacity: self.capacity,
            percent,
            breached,
        }
    }
}

impl fmt::Debug for QueueMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueMonitor")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

fn occupancy_percent(current: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    100.0 * current as f64 / capacity as f64
}

/// Ordered collection of queue monitors; duplicates are kept
#[derive(Debug, Default, Clone)]
pub struct QueueMonitorRegistry {
    monitors: Vec<QueueMonitor>,
}

impl QueueMonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_monitor(&mut self, monitor: QueueMonitor) {
        debug!(name = %monitor.name(), "QueueMonitorRegistry::add_monitor: called");
        self.monitors.push(monitor);
    }

    /// Check every monitor in registration order
    pub fn check_all(&self) -> Vec<QueueUsage> {
        self.monitors.iter().map(QueueMonitor::check_usage).collect()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_nine_of_ten_breaches_at_ninety() {
        let usage = QueueMonitor::new("requests", 10, || 9).with_threshold(90.0).check_usage();
        assert_eq!(usage.percent, 90.0);
        assert!(usage.breached);
    }

    #[test]
    fn test_nine_of_ten_breaches_below_ninety() {
        for threshold in [50.0, 80.0, 89.9] {
            let usage = QueueMonitor::new("requests", 10, || 9).with_threshold(threshold).check_usage();
            assert!(usage.breached, "threshold {threshold}");
        }
    }

    #[test]
    fn test_one_of_ten_never_breaches_default() {
        let monitor = QueueMonitor::new("requests", 10, || 1);
        assert_eq!(monitor.threshold(), 80.0);
        let usage = monitor.check_usage();
        assert_eq!(usage.percent, 10.0);
        assert!(!usage.breached);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let usage = QueueMonitor::new("events", 10, || 8).check_usage();
        assert!(usage.breached);
    }

    #[test]
    fn test_zero_capacity() {
        assert!(!QueueMonitor::new("empty", 0, || 0).check_usage().breached);
        let usage = QueueMonitor::new("full", 0, || 3).check_usage();
        assert_eq!(usage.percent, 100.0);
        assert!(usage.breached);
    }

    #[test]
    fn test_probe_reads_live_value() {
        let depth = Arc::new(AtomicUsize::new(0));
        let probe_depth = Arc::clone(&depth);
        let monitor = QueueMonitor::new("live", 4, move || probe_depth.load(Ordering::SeqCst));

        assert_eq!(monitor.check_usage().current, 0);
        depth.store(4, Ordering::SeqCst);
        let usage = monitor.check_usage();
        assert_eq!(usage.current, 4);
        assert!(usage.breached);
    }

    #[tokio::test]
    async fn test_mpsc_monitor() {
        let (tx, mut rx) = mpsc::channel::<u32>(10);
        let monitor = QueueMonitor::for_mpsc("commands", &tx);
        assert_eq!(monitor.capacity(), 10);

        for i in 0..9 {
            tx.send(i).await.unwrap();
        }
        let usage = monitor.check_usage();
        assert_eq!(usage.current, 9);
        assert!(usage.breached);

        rx.recv().await.unwrap();
        assert_eq!(monitor.check_usage().current, 8);
    }

    #[tokio::test]
    async fn test_mpsc_monitor_does_not_keep_channel_open() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let monitor = QueueMonitor::for_mpsc("commands", &tx);
        drop(tx);
        assert_eq!(rx.recv().await, None);
        assert_eq!(monitor.check_usage().current, 0);
    }

    #[tokio::test]
    async fn test_broadcast_monitor() {
        let (tx, _rx) = broadcast::channel::<u32>(16);
        let monitor = QueueMonitor::for_broadcast("notifications", &tx, 16);
        for i in 0..4 {
            tx.send(i).unwrap();
        }
        let usage = monitor.check_usage();
        assert_eq!(usage.current, 4);
        assert_eq!(usage.percent, 25.0);
    }

    #[test]
    fn test_registry_keeps_order_and_duplicates() {
        let mut registry = QueueMonitorRegistry::new();
        assert!(registry.is_empty());

        let monitor = QueueMonitor::new("a", 10, || 9);
        registry.add_monitor(monitor.clone());
        registry.add_monitor(QueueMonitor::new("b", 10, || 1));
        registry.add_monitor(monitor);

        let results = registry.check_all();
        assert_eq!(registry.len(), 3);
        let names: Vec<_> = results.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        let breached: Vec<_> = results.iter().map(|u| u.breached).collect();
        assert_eq!(breached, vec![true, false, true]);
    }
}

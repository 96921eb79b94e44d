//! Per-device admission table

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::CoordinatorConfig;
use super::entry::{ActiveUpdate, CancelHandle};
use crate::device::DeviceKey;

/// The Coordinator admits at most one update per device key at a time.
///
/// Entries are created by [`mark_active`](Self::mark_active) and destroyed by
/// whichever comes first: [`mark_inactive`](Self::mark_inactive), forced
/// preemption through [`is_active`](Self::is_active), stale reclaim on query,
/// or the background sweep. Only forced preemption runs the stored
/// [`CancelHandle`]; the stale paths drop it unrun.
pub struct Coordinator {
    config: CoordinatorConfig,
    active: RwLock<HashMap<DeviceKey, ActiveUpdate>>,
}

impl Coordinator {
    /// Create a new Coordinator with the given configuration
    pub fn new(config: CoordinatorConfig) -> Self {
        debug!(?config, "Coordinator::new: called");
        Self {
            config,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Staleness threshold in effect
    pub fn staleness(&self) -> Duration {
        self.config.staleness()
    }

    /// Admit an update for `key`, replacing any existing entry without cancelling it
    pub async fn mark_active(&self, key: &DeviceKey, cancel: Option<CancelHandle>) {
        debug!(device = %key, has_cancel = cancel.is_some(), "Coordinator::mark_active: called");
        let mut active = self.active.write().await;
        if active.insert(key.clone(), ActiveUpdate::new(cancel)).is_some() {
            debug!(device = %key, "Coordinator::mark_active: replaced existing entry");
        }
    }

    /// Check whether an update for `key` is admitted.
    ///
    /// With `force`, any existing entry is removed and its cancel handle run,
    /// and the answer is always `false`. Without it, a fresh entry answers
    /// `true`; a stale one is reclaimed and answers `false`.
    pub async fn is_active(&self, key: &DeviceKey, force: bool) -> bool {
        debug!(device = %key, force, "Coordinator::is_active: called");
        if force {
            self.preempt(key).await;
            return false;
        }

        let stale = {
            let active = self.active.read().await;
            match active.get(key) {
                None => {
                    debug!(device = %key, "Coordinator::is_active: no entry");
                    return false;
                }
                Some(entry) => entry.is_stale(Instant::now(), self.staleness()),
            }
        };

        if !stale {
            debug!(device = %key, "Coordinator::is_active: fresh entry");
            return true;
        }

        self.reclaim_if_stale(key).await;
        false
    }

    /// Release admission for `key`
    pub async fn mark_inactive(&self, key: &DeviceKey) {
        debug!(device = %key, "Coordinator::mark_inactive: called");
        self.active.write().await.remove(key);
    }

    /// Remove the entry for `key` and run its cancel handle
    async fn preempt(&self, key: &DeviceKey) {
        let removed = self.active.write().await.remove(key);
        // Handle runs after the write guard is released
        if let Some(ActiveUpdate { cancel: Some(cancel), .. }) = removed {
            debug!(device = %key, "Coordinator::preempt: cancelling existing update");
            cancel.invoke();
        }
    }

    /// Slow path of the stale check: re-validate under the write lock, since a
    /// concurrent `mark_active` may have refreshed the entry after the read.
    async fn reclaim_if_stale(&self, key: &DeviceKey) -> bool {
        let mut active = self.active.write().await;
        let still_stale = active
            .get(key)
            .is_some_and(|entry| entry.is_stale(Instant::now(), self.config.staleness()));

        if still_stale {
            if let Some(entry) = active.remove(key) {
                debug!(device = %key, age = ?entry.age(Instant::now()), "Coordinator::reclaim_if_stale: reclaimed");
            }
        } else {
            debug!(device = %key, "Coordinator::reclaim_if_stale: refreshed concurrently, keeping");
        }
        still_stale
    }

    /// Remove every stale entry without running cancel handles.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_stale(&self) -> usize {
        let staleness = self.staleness();
        let now = Instant::now();
        let mut active = self.active.write().await;
        let before = active.len();

        active.retain(|key, entry| {
            let stale = entry.is_stale(now, staleness);
            if stale {
                debug!(device = %key, age = ?entry.age(now), "Cleaned up stale active update entry");
            }
            !stale
        });

        let removed = before - active.len();
        if removed > 0 {
            debug!(removed, remaining = active.len(), "Coordinator::sweep_stale: swept");
        }
        removed
    }

    /// Run the background sweep until `shutdown` is cancelled
    pub async fn run_sweeper(self: Arc<Self>, shutdown: CancellationToken) {
        let period = self.config.sweep_interval();
        info!(?period, staleness = ?self.staleness(), "Coordinator sweeper started");

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_stale().await;
                }
            }
        }

        info!("Coordinator sweeper stopped");
    }

    /// Spawn [`run_sweeper`](Self::run_sweeper) on the current runtime
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        debug!("Coordinator::spawn_sweeper: called");
        tokio::spawn(Arc::clone(self).run_sweeper(shutdown))
    }

    /// Number of admitted updates
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// Whether an entry exists for `key`, stale or not
    pub async fn contains(&self, key: &DeviceKey) -> bool {
        self.active.read().await.contains_key(key)
    }

    /// Age of the entry for `key`
    pub async fn age(&self, key: &DeviceKey) -> Option<Duration> {
        let now = Instant::now();
        self.active.read().await.get(key).map(|entry| entry.age(now))
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

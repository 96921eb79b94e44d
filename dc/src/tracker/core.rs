//! Operation tracker implementation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::timeout::TimeoutConfig;

use super::types::{OperationContext, OperationInfo, OperationOutcome, OperationType};

struct TrackerInner {
    operations: HashMap<String, OperationInfo>,
    limits: HashMap<OperationType, Duration>,
}

/// Registry of running operations with per-type overrun limits
pub struct OperationTracker {
    inner: RwLock<TrackerInner>,
}

impl OperationTracker {
    /// Create a tracker whose overrun limits mirror the timeout configuration
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        debug!(?timeouts, "OperationTracker::new: called");
        let limits = HashMap::from([
            (OperationType::Discover, timeouts.discovery()),
            (OperationType::UpdateProperties, timeouts.property_update()),
            (OperationType::GetProperties, timeouts.property_get()),
            (OperationType::SetProperties, timeouts.property_set()),
        ]);
        Self {
            inner: RwLock::new(TrackerInner {
                operations: HashMap::new(),
                limits,
            }),
        }
    }

    /// Begin tracking an operation. Reusing an id replaces the earlier entry.
    pub async fn start_operation(
        &self,
        id: &str,
        op_type: OperationType,
        description: &str,
        context: OperationContext,
    ) {
        debug!(%id, %op_type, %description, "OperationTracker::start_operation: called");
        let info = OperationInfo {
            id: id.to_string(),
            op_type,
            started_at: Instant::now(),
            started_wall: Utc::now(),
            description: description.to_string(),
            context,
        };
        self.inner.write().await.operations.insert(id.to_string(), info);
    }

    /// Record how an operation ended and stop tracking it
    ///
    /// Returns false when the id was unknown (already completed or dropped by
    /// an overrun check).
    pub async fn complete_operation(&self, id: &str, outcome: OperationOutcome) -> bool {
        let Some(info) = self.inner.write().await.operations.remove(id) else {
            debug!(%id, "OperationTracker::complete_operation: unknown id");
            return false;
        };

        let duration = info.elapsed();
        match outcome {
            OperationOutcome::Succeeded => debug!(
                %id,
                op_type = %info.op_type,
                ?duration,
                description = %info.description,
                "Operation completed successfully"
            ),
            OperationOutcome::Failed(reason) => error!(
                %id,
                op_type = %info.op_type,
                ?duration,
                description = %info.description,
                error = %reason,
                "Operation failed"
            ),
        }
        true
    }

    /// Override the overrun limit for one operation type
    pub async fn set_timeout(&self, op_type: OperationType, limit: Duration) {
        debug!(%op_type, ?limit, "OperationTracker::set_timeout: called");
        self.inner.write().await.limits.insert(op_type, limit);
    }

    /// Warn about and forget every operation running longer than its limit
    pub async fn check_timeouts(&self) -> Vec<OperationInfo> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let TrackerInner { operations, limits } = &mut *inner;

        let overrun: Vec<String> = operations
            .values()
            .filter(|info| {
                limits
                    .get(&info.op_type)
                    .is_some_and(|limit| now.saturating_duration_since(info.started_at) > *limit)
            })
            .map(|info| info.id.clone())
            .collect();

        let mut dropped = Vec::with_capacity(overrun.len());
        for id in overrun {
            if let Some(info) = operations.remove(&id) {
                warn!(
                    %id,
                    op_type = %info.op_type,
                    duration = ?now.saturating_duration_since(info.started_at),
                    limit = ?limits.get(&info.op_type),
                    description = %info.description,
                    context = %serde_json::Value::Object(info.context.clone()),
                    "Operation timeout detected"
                );
                dropped.push(info);
            }
        }
        dropped
    }

    pub async fn running_operations(&self) -> Vec<OperationInfo> {
        self.inner.read().await.operations.values().cloned().collect()
    }

    pub async fn operation_count(&self) -> usize {
        self.inner.read().await.operations.len()
    }

    pub async fn operations_by_type(&self, op_type: OperationType) -> Vec<OperationInfo> {
        self.inner
            .read()
            .await
            .operations
            .values()
            .filter(|info| info.op_type == op_type)
            .cloned()
            .collect()
    }

    /// Run `check_timeouts` every `interval` until `shutdown` is cancelled
    pub fn spawn(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        debug!(?interval, "OperationTracker::spawn: called");
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let period = interval.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracker.check_timeouts().await;
                    }
                    _ = shutdown.cancelled() => {
                        debug!("OperationTracker: shutdown requested");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new(&TimeoutConfig::default())
    }
}

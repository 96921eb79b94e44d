//! Update dispatcher implementation

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eyre::{Result, eyre};
use futures::future::join_all;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::coordinator::{CancelHandle, Coordinator};
use crate::device::{DeviceAddr, DeviceKey};
use crate::notify::{DeviceEventKind, DeviceNotification, NotificationRelay};
use crate::timeout::{TimeoutEnforcer, TimeoutError};
use crate::tracker::{OperationContext, OperationOutcome, OperationTracker, OperationType, new_operation_id};

use super::config::DispatchConfig;
use super::delay::calculate_request_delay;
use super::traits::{DataAccessor, PropertyClient};

/// Counts from one `update_properties` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Refreshes that were admitted and launched
    pub dispatched: usize,
    pub updated: usize,
    pub skipped_recent: usize,
    pub skipped_offline: usize,
    /// Another update for the same device was already admitted
    pub skipped_active: usize,
    /// Cancelled by a forced update or shutdown before finishing
    pub preempted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Updated,
    Preempted,
}

/// Everything one refresh task needs, cloned out of the dispatcher
#[derive(Clone)]
struct RefreshContext {
    enforcer: TimeoutEnforcer,
    tracker: Arc<OperationTracker>,
    accessor: Arc<dyn DataAccessor>,
    client: Arc<dyn PropertyClient>,
    relay: Arc<dyn NotificationRelay>,
}

/// Drives property refreshes through admission control and deadlines
pub struct UpdateDispatcher {
    config: DispatchConfig,
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
    ctx: RefreshContext,
}

impl UpdateDispatcher {
    pub fn new(
        config: DispatchConfig,
        accessor: Arc<dyn DataAccessor>,
        client: Arc<dyn PropertyClient>,
        relay: Arc<dyn NotificationRelay>,
    ) -> Self {
        debug!(?config, "UpdateDispatcher::new: called");
        Self {
            config,
            coordinator: Arc::new(Coordinator::default()),
            shutdown: CancellationToken::new(),
            ctx: RefreshContext {
                enforcer: TimeoutEnforcer::default(),
                tracker: Arc::new(OperationTracker::default()),
                accessor,
                client,
                relay,
            },
        }
    }

    pub fn with_coordinator(mut self, coordinator: Arc<Coordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_enforcer(mut self, enforcer: TimeoutEnforcer) -> Self {
        self.ctx.enforcer = enforcer;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<OperationTracker>) -> Self {
        self.ctx.tracker = tracker;
        self
    }

    /// Every refresh token is a child of `shutdown`
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn tracker(&self) -> &Arc<OperationTracker> {
        &self.ctx.tracker
    }

    /// Refresh the properties of `devices`, waiting for every launched refresh
    ///
    /// Without `force`, recently refreshed devices and offline devices whose
    /// node profile is also offline are skipped, as is any device with an
    /// admitted update in flight. With `force`, an in-flight update is
    /// cancelled and replaced. Returns the first refresh error, if any.
    pub async fn update_properties(&self, devices: &[DeviceAddr], force: bool) -> Result<UpdateSummary> {
        debug!(count = devices.len(), force, "UpdateDispatcher::update_properties: called");
        if devices.is_empty() {
            warn!("No devices matched");
            return Err(eyre!("No devices to update"));
        }

        let started = tokio::time::Instant::now();
        let mut summary = UpdateSummary::default();
        let mut per_ip: HashMap<IpAddr, usize> = HashMap::new();
        let mut launched: Vec<(DeviceAddr, DeviceKey)> = Vec::new();
        let mut handles: Vec<JoinHandle<Result<RefreshOutcome>>> = Vec::new();

        for device in devices {
            if !force {
                if self.recently_updated(device) {
                    debug!(%device, "Skipping recently updated device");
                    summary.skipped_recent += 1;
                    continue;
                }
                let accessor = &self.ctx.accessor;
                if accessor.is_offline(device) && accessor.is_offline(&device.node_profile()) {
                    debug!(%device, "Skipping offline device");
                    summary.skipped_offline += 1;
                    continue;
                }
            }

            let index = per_ip.entry(device.ip).or_insert(0);
            *index += 1;
            let delay = calculate_request_delay(*index, self.config.base_request_delay());

            let key = device.key();
            if self.coordinator.is_active(&key, force).await {
                info!(%device, "Update already active, skipping");
                summary.skipped_active += 1;
                continue;
            }

            let token = self.shutdown.child_token();
            self.coordinator
                .mark_active(&key, Some(CancelHandle::from(token.clone())))
                .await;

            let ctx = self.ctx.clone();
            let coordinator = Arc::clone(&self.coordinator);
            let shutdown = self.shutdown.clone();
            let target = *device;
            let task_key = key.clone();
            let handle = tokio::spawn(async move {
                let result = refresh_device(ctx, target, delay, force, token.clone()).await;
                // a forced update already removed this entry and may own the key now
                if !token.is_cancelled() || shutdown.is_cancelled() {
                    coordinator.mark_inactive(&task_key).await;
                }
                result
            });
            summary.dispatched += 1;
            launched.push((*device, key));
            handles.push(handle);
        }

        debug!(dispatched = summary.dispatched, "Waiting for all device updates to complete");
        let joined = join_all(handles).await;
        let mut first_error = None;
        for ((device, key), joined) in launched.into_iter().zip(joined) {
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => {
                    // the task never reached its own release
                    self.coordinator.mark_inactive(&key).await;
                    Err(eyre!("Update task for {} ended abnormally: {}", device, join_err))
                }
            };
            match result {
                Ok(RefreshOutcome::Updated) => summary.updated += 1,
                Ok(RefreshOutcome::Preempted) => summary.preempted += 1,
                Err(e) => {
                    summary.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        let duration = started.elapsed();
        match first_error {
            Some(e) => {
                error!(?summary, ?duration, first_error = %e, "Property update completed with errors");
                Err(e)
            }
            None => {
                debug!(?summary, ?duration, "Property update completed successfully");
                Ok(summary)
            }
        }
    }

    fn recently_updated(&self, device: &DeviceAddr) -> bool {
        let Some(last) = self.ctx.accessor.last_update_time(device) else {
            return false;
        };
        (Utc::now() - last)
            .to_std()
            .map(|age| age < self.config.update_interval_threshold())
            .unwrap_or(true)
    }
}

async fn refresh_device(
    ctx: RefreshContext,
    device: DeviceAddr,
    delay: Duration,
    force: bool,
    token: CancellationToken,
) -> Result<RefreshOutcome> {
    if !delay.is_zero() {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(%device, "Update cancelled during request spacing");
                return Ok(RefreshOutcome::Preempted);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    let op_id = new_operation_id(OperationType::UpdateProperties);
    let mut context = OperationContext::new();
    context.insert("device".to_string(), json!(device.to_string()));
    context.insert("force".to_string(), json!(force));
    ctx.tracker
        .start_operation(&op_id, OperationType::UpdateProperties, &format!("Update properties of {device}"), context)
        .await;

    let client = Arc::clone(&ctx.client);
    let fetch_token = token.clone();
    let fetched: Result<_> = ctx
        .enforcer
        .with_property_update_timeout(&token, move || async move {
            client.fetch_properties(&device, fetch_token).await
        })
        .await;

    match fetched {
        Ok(properties) => {
            ctx.tracker.complete_operation(&op_id, OperationOutcome::Succeeded).await;
            if !properties.is_empty() {
                let changes = ctx.accessor.register_properties(&device, properties);
                ctx.accessor.set_offline(&device, false);
                debug!(%device, changed = changes.len(), "Properties registered");
                for change in changes {
                    ctx.relay.relay_property_change(change);
                }
            }
            Ok(RefreshOutcome::Updated)
        }
        Err(e) => {
            ctx.tracker
                .complete_operation(&op_id, OperationOutcome::failed(&e))
                .await;
            match e.downcast_ref::<TimeoutError>() {
                Some(timeout) if !timeout.is_elapsed() => {
                    info!(%device, "Update preempted");
                    Ok(RefreshOutcome::Preempted)
                }
                Some(_) => {
                    ctx.accessor.set_offline(&device, true);
                    ctx.relay.relay_device_event(DeviceNotification {
                        device,
                        kind: DeviceEventKind::DeviceTimeout,
                        error: Some(e.to_string()),
                    });
                    Err(e.wrap_err(format!("Failed to get properties of {device}")))
                }
                None => Err(e.wrap_err(format!("Failed to get properties of {device}"))),
            }
        }
    }
}

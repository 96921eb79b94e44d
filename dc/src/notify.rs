//! Fire-and-forget notification relay

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::device::DeviceAddr;

/// Device lifecycle event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEventKind {
    DeviceAdded,
    DeviceTimeout,
    DeviceOffline,
}

impl fmt::Display for DeviceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceEventKind::DeviceAdded => "device_added",
            DeviceEventKind::DeviceTimeout => "device_timeout",
            DeviceEventKind::DeviceOffline => "device_offline",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNotification {
    pub device: DeviceAddr,
    pub kind: DeviceEventKind,
    pub error: Option<String>,
}

/// A single property value that changed on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub device: DeviceAddr,
    pub epc: u8,
    pub before: Option<Vec<u8>>,
    pub after: Vec<u8>,
}

/// Everything that travels on the notification bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Device(DeviceNotification),
    PropertyChanged(PropertyChange),
}

/// Sink for device and property events. Delivery is best-effort.
pub trait NotificationRelay: Send + Sync {
    fn relay_device_event(&self, event: DeviceNotification);
    fn relay_property_change(&self, change: PropertyChange);
}

/// Broadcast-channel relay; events sent with no subscribers are dropped
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
    capacity: usize,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "NotificationBus::new: called");
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Underlying sender, for queue monitoring
    pub fn sender(&self) -> &broadcast::Sender<Notification> {
        &self.tx
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn publish(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("NotificationBus::publish: no subscribers");
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationRelay for NotificationBus {
    fn relay_device_event(&self, event: DeviceNotification) {
        debug!(device = %event.device, kind = %event.kind, "NotificationBus::relay_device_event: called");
        self.publish(Notification::Device(event));
    }

    fn relay_property_change(&self, change: PropertyChange) {
        debug!(device = %change.device, epc = change.epc, "NotificationBus::relay_property_change: called");
        self.publish(Notification::PropertyChanged(change));
    }
}

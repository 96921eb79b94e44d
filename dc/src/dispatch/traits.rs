//! Collaborators the dispatcher depends on

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::device::DeviceAddr;
use crate::notify::PropertyChange;

/// Property values keyed by property code
pub type PropertyMap = BTreeMap<u8, Vec<u8>>;

/// Device and property store
pub trait DataAccessor: Send + Sync {
    /// When the device's properties were last refreshed, if ever
    fn last_update_time(&self, device: &DeviceAddr) -> Option<DateTime<Utc>>;

    fn is_offline(&self, device: &DeviceAddr) -> bool;

    fn set_offline(&self, device: &DeviceAddr, offline: bool);

    /// Store new values and return the ones that changed
    fn register_properties(&self, device: &DeviceAddr, properties: PropertyMap) -> Vec<PropertyChange>;
}

/// Performs the network read of a device's properties
#[async_trait]
pub trait PropertyClient: Send + Sync {
    /// Fetch current property values. Implementations should stop when
    /// `cancel` fires.
    async fn fetch_properties(&self, device: &DeviceAddr, cancel: CancellationToken) -> eyre::Result<PropertyMap>;
}

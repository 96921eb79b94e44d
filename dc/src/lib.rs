//! devicecoord - concurrency coordination for networked device controllers
//!
//! Sits between protocol logic and the network. Before refreshing a device,
//! callers ask the [`Coordinator`] whether an update is already admitted,
//! run the network operation under a [`TimeoutEnforcer`] deadline, and
//! release admission when it ends. The [`ResourceMonitor`] watches task,
//! memory and queue pressure independently and only ever logs.
//!
//! # Modules
//!
//! - [`device`] - Device addressing and admission keys
//! - [`coordinator`] - Per-device admission control with staleness reaping
//! - [`timeout`] - Deadline enforcement for outbound operations
//! - [`monitor`] - Process sampler and queue occupancy monitors
//! - [`tracker`] - In-flight operation tracking
//! - [`dispatch`] - Property refresh flow tying the above together
//! - [`notify`] - Device and property event relay
//! - [`groups`] - Named device groups with file persistence
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod dispatch;
pub mod groups;
pub mod monitor;
pub mod notify;
pub mod timeout;
pub mod tracker;

// Re-export commonly used types
pub use config::{Config, StorageConfig};
pub use coordinator::{CancelHandle, Coordinator, CoordinatorConfig};
pub use device::{DeviceAddr, DeviceKey, DeviceParseError, ObjectId};
pub use dispatch::{DataAccessor, DispatchConfig, PropertyClient, PropertyMap, UpdateDispatcher, UpdateSummary};
pub use groups::{GroupEntry, GroupError, GroupRegistry};
pub use monitor::{
    MonitoringConfig, ProcessSample, ProcessSampler, QueueMonitor, QueueMonitorRegistry, QueueUsage, ResourceMonitor,
};
pub use notify::{
    DeviceEventKind, DeviceNotification, Notification, NotificationBus, NotificationRelay, PropertyChange,
};
pub use timeout::{TimeoutConfig, TimeoutEnforcer, TimeoutError, with_cooperative_timeout, with_timeout};
pub use tracker::{OperationInfo, OperationOutcome, OperationTracker, OperationType};

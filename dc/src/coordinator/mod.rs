//! Device operation coordinator
//!
//! Per-device admission control for update operations:
//! - **Admission:** at most one active update per device key
//! - **Preemption:** a forced check cancels and releases a stuck update
//! - **Reclaim:** stale entries are dropped on query and by a background sweep

mod config;
mod core;
mod entry;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use entry::CancelHandle;

//! Property update dispatch
//!
//! The admission flow around a device refresh: check the coordinator, mark
//! the device active with a cancellable token, run the fetch under its
//! deadline, then release admission however the fetch ended.

mod config;
mod core;
mod delay;
mod traits;

pub use config::DispatchConfig;
pub use core::{UpdateDispatcher, UpdateSummary};
pub use delay::{JITTER_RATIO, MAX_DELAY_MULTIPLIER, MIN_INTERVAL_RATIO, calculate_request_delay};
pub use traits::{DataAccessor, PropertyClient, PropertyMap};

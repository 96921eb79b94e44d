//! Timeout enforcement
//!
//! Every outbound operation runs under a deadline. The enforcer bounds how
//! long a *caller* waits; the detached variant does not stop the underlying
//! work, the cooperative variant asks it to.

mod config;
mod core;
mod error;

pub use config::TimeoutConfig;
pub use core::{TimeoutEnforcer, with_cooperative_timeout, with_timeout};
pub use error::TimeoutError;

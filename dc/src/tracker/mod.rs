//! In-flight operation tracking
//!
//! A lightweight registry of running device operations. The periodic check
//! logs and forgets operations that overran their per-type limit; it never
//! cancels them.

mod core;
mod types;

pub use core::OperationTracker;
pub use types::{OperationContext, OperationInfo, OperationOutcome, OperationType, new_operation_id};

//! Timeout error types

use std::time::Duration;
use thiserror::Error;

/// The caller stopped waiting for an enforced operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeoutError {
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Elapsed { operation: String, timeout: Duration },

    #[error("Operation '{operation}' abandoned before its {timeout:?} deadline: cancelled")]
    Cancelled { operation: String, timeout: Duration },
}

impl TimeoutError {
    /// Name of the operation that was being waited on
    pub fn operation(&self) -> &str {
        match self {
            TimeoutError::Elapsed { operation, .. } | TimeoutError::Cancelled { operation, .. } => operation,
        }
    }

    /// Configured deadline of the operation
    pub fn timeout(&self) -> Duration {
        match self {
            TimeoutError::Elapsed { timeout, .. } | TimeoutError::Cancelled { timeout, .. } => *timeout,
        }
    }

    /// True when the deadline itself elapsed
    pub fn is_elapsed(&self) -> bool {
        matches!(self, TimeoutError::Elapsed { .. })
    }
}

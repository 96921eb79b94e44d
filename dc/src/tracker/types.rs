//! Operation tracker types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// Free-form key/value detail attached to an operation
pub type OperationContext = serde_json::Map<String, serde_json::Value>;

/// Kind of device operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Discover,
    UpdateProperties,
    GetProperties,
    SetProperties,
}

impl OperationType {
    pub const ALL: [OperationType; 4] = [
        OperationType::Discover,
        OperationType::UpdateProperties,
        OperationType::GetProperties,
        OperationType::SetProperties,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Discover => "discover",
            OperationType::UpdateProperties => "update_properties",
            OperationType::GetProperties => "get_properties",
            OperationType::SetProperties => "set_properties",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a running operation
#[derive(Debug, Clone)]
pub struct OperationInfo {
    pub id: String,
    pub op_type: OperationType,
    /// Monotonic start, used for overrun checks
    pub started_at: Instant,
    /// Wall-clock start, for display
    pub started_wall: DateTime<Utc>,
    pub description: String,
    pub context: OperationContext,
}

impl OperationInfo {
    pub fn elapsed(&self) -> std::time::Duration {
        Instant::now().saturating_duration_since(self.started_at)
    }
}

/// How an operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded,
    Failed(String),
}

impl OperationOutcome {
    pub fn failed(error: impl fmt::Display) -> Self {
        OperationOutcome::Failed(error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Succeeded)
    }
}

/// Generate a unique, time-ordered operation id such as `update_properties-0190...`
pub fn new_operation_id(op_type: OperationType) -> String {
    format!("{}-{}", op_type, Uuid::now_v7())
}

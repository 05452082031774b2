//! Import log: execution record for one step run.

use chrono::{DateTime, Utc};

/// Lifecycle status of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    InProgress,
    Success,
    Error,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::InProgress => "in progress",
            ImportStatus::Success => "success",
            ImportStatus::Error => "error",
        }
    }

    pub fn from_str(value: &str) -> Option<ImportStatus> {
        match value {
            "in progress" => Some(ImportStatus::InProgress),
            "success" => Some(ImportStatus::Success),
            "error" => Some(ImportStatus::Error),
            _ => None,
        }
    }
}

/// One row per step execution. Created at step start, mutated throughout,
/// finalized with a status and end timestamp on completion or failure.
#[derive(Debug, Clone)]
pub struct ImportLog {
    pub import_log_id: i64,
    /// Step name that produced this run.
    pub source: String,
    pub status: ImportStatus,
    /// Flattened metrics map, JSON.
    pub report: Option<serde_json::Value>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

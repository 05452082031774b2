//! Pipeline execution framework.
//!
//! A [`Step`](step::Step) is one unit of pipeline work. The runner wraps
//! each step in an import-log scope with before/after state-count
//! snapshots and owns commit/rollback of the step's transaction. Fatal
//! errors travel through [`StepError`]; per-record validation issues
//! travel through `ValidationContainer` values and never become errors.

pub mod files;
pub mod log_entry;
pub mod step;

pub use log_entry::LogEntry;
pub use step::{run_steps, Step, StepContext, StepRunner};

use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, StepError>;

/// Fatal, batch-halting errors. Caught only at the step boundary, where
/// the whole step rolls back and the run halts.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transaction control failures (begin/commit/rollback).
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// A programmer-invariant violation, e.g. a state log with no
    /// associated entity where one was required, or an unexpected payment
    /// method in the method-split step.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    FixedWidth(#[from] crate::outbound::fixed_width::FixedWidthError),
}

impl StepError {
    pub fn invariant(message: impl Into<String>) -> StepError {
        StepError::Invariant(message.into())
    }
}

impl From<crate::model::MissingEntity> for StepError {
    fn from(err: crate::model::MissingEntity) -> StepError {
        StepError::Invariant(err.to_string())
    }
}

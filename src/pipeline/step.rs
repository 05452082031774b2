//! The step contract and the runner that executes steps.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqliteConnection;
use tracing::{error, info, warn};

use crate::model::ImportStatus;
use crate::storage::{state_log_store, Database};

use super::log_entry::LogEntry;
use super::{Result, StepError};

/// Everything a step body may touch: the working-database transaction
/// and the step's log scope. Fields are public so a body can borrow the
/// connection and the log entry independently.
pub struct StepContext<'a> {
    pub conn: &'a mut SqliteConnection,
    pub log: &'a mut LogEntry,
}

impl StepContext<'_> {
    pub fn import_log_id(&self) -> Option<i64> {
        self.log.import_log_id()
    }

    pub fn increment(&mut self, name: &str) {
        self.log.increment(name);
    }

    pub fn set_metric(&mut self, name: &str, value: Value) {
        self.log.set_metric(name, value);
    }
}

/// One unit of pipeline work. Implementations mutate state only through
/// the context's transaction; the runner decides whether that transaction
/// commits.
#[async_trait]
pub trait Step: Send {
    fn name(&self) -> &'static str;

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()>;

    /// Whether the runner should invoke this step again immediately.
    /// Steps that consume one inbound file per invocation report pending
    /// files here; everything else takes the default.
    fn have_more_files_to_process(&self) -> bool {
        false
    }
}

/// Executes steps against the working database while logging to the log
/// database. The two handles must be distinct sessions so an error-marked
/// import log survives the working rollback.
pub struct StepRunner {
    db: Database,
    log_db: Database,
}

impl StepRunner {
    pub fn new(db: Database, log_db: Database) -> StepRunner {
        StepRunner { db, log_db }
    }

    /// Run one step invocation: open its import log, snapshot state
    /// counts, execute the body in a transaction, commit on success or
    /// roll back on error, snapshot again, finalize the log.
    pub async fn run(&self, step: &mut dyn Step) -> Result<()> {
        let name = step.name();
        info!(step = name, "starting step");
        let mut log_entry = LogEntry::start(&self.log_db, name).await?;

        let before = self.state_counts().await?;
        log_entry.set_metric("before_state_log_counts", serde_json::to_value(&before)?);

        let mut tx = self.db.begin().await?;
        let outcome = {
            let mut ctx = StepContext {
                conn: &mut *tx,
                log: &mut log_entry,
            };
            step.run_step(&mut ctx).await
        };

        match outcome {
            Ok(()) => {
                tx.commit().await?;
                let after = self.state_counts().await?;
                log_entry.set_metric("after_state_log_counts", serde_json::to_value(&after)?);
                log_entry.finalize(ImportStatus::Success).await?;
                info!(step = name, "step complete");
                Ok(())
            }
            Err(step_error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(step = name, error = %rollback_error, "rollback failed");
                }
                error!(step = name, error = %step_error, "step failed, rolled back");
                log_entry.set_metric("error", Value::from(step_error.to_string()));
                let after = self.state_counts().await?;
                log_entry.set_metric("after_state_log_counts", serde_json::to_value(&after)?);
                log_entry.finalize(ImportStatus::Error).await?;
                Err(step_error)
            }
        }
    }

    async fn state_counts(&self) -> Result<std::collections::BTreeMap<String, i64>> {
        let mut conn = self.db.acquire().await?;
        Ok(state_log_store::get_state_counts(&mut conn).await?)
    }
}

/// Run a step sequence in order, re-invoking any step that reports more
/// files to process before moving on. The first fatal error halts the
/// whole sequence.
pub async fn run_steps(
    runner: &StepRunner,
    steps: &mut [Box<dyn Step>],
) -> std::result::Result<(), StepError> {
    for step in steps.iter_mut() {
        loop {
            runner.run(step.as_mut()).await?;
            if !step.have_more_files_to_process() {
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;

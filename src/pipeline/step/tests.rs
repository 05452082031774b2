use async_trait::async_trait;
use uuid::Uuid;

use super::*;
use crate::model::{EntityClass, ImportStatus, State, StateLogEntity};
use crate::storage::{import_log_store, state_log_store};
use crate::test_utils::test_db;

struct RecordOneTransition {
    end_state: State,
    fail_after_write: bool,
}

#[async_trait]
impl Step for RecordOneTransition {
    fn name(&self) -> &'static str {
        "record-one-transition"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let entity = StateLogEntity::Payment(Uuid::new_v4());
        let import_log_id = ctx.import_log_id();
        state_log_store::create_state_log(ctx.conn, self.end_state, None, entity, import_log_id)
            .await?;
        ctx.increment("records_processed");
        if self.fail_after_write {
            return Err(StepError::invariant("boom"));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_successful_step_commits_and_logs_success() {
    let db = test_db().await;
    let log_db = test_db().await;
    let runner = StepRunner::new(db.clone(), log_db.clone());

    let mut step = RecordOneTransition {
        end_state: State::PaymentValidated,
        fail_after_write: false,
    };
    runner.run(&mut step).await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    let waiting = state_log_store::get_all_latest_state_logs_in_end_state(
        &mut conn,
        EntityClass::Payment,
        State::PaymentValidated,
    )
    .await
    .unwrap();
    assert_eq!(waiting.len(), 1);

    let mut log_conn = log_db.acquire().await.unwrap();
    let import_log = import_log_store::get_import_log(&mut log_conn, 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(import_log.status, ImportStatus::Success);
    assert_eq!(import_log.source, "record-one-transition");
    let report = import_log.report.unwrap();
    assert_eq!(report.get("records_processed"), Some(&1.into()));
    // State counts flatten into the report alongside plain metrics.
    assert_eq!(
        report.get("after_state_log_counts_Delegated Payment - Payment validated"),
        Some(&1.into())
    );
}

#[tokio::test]
async fn test_failed_step_rolls_back_but_error_log_survives() {
    let db = test_db().await;
    let log_db = test_db().await;
    let runner = StepRunner::new(db.clone(), log_db.clone());

    let mut step = RecordOneTransition {
        end_state: State::PaymentValidated,
        fail_after_write: true,
    };
    let err = runner.run(&mut step).await.unwrap_err();
    assert!(matches!(err, StepError::Invariant(_)));

    // The write inside the step rolled back with everything else.
    let mut conn = db.acquire().await.unwrap();
    let counts = state_log_store::get_state_counts(&mut conn).await.unwrap();
    assert!(counts.is_empty());

    // The log database is a separate session, so the error row persists.
    let mut log_conn = log_db.acquire().await.unwrap();
    let import_log = import_log_store::get_import_log(&mut log_conn, 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(import_log.status, ImportStatus::Error);
    let report = import_log.report.unwrap();
    assert_eq!(
        report.get("error").and_then(|v| v.as_str()),
        Some("invariant violated: boom")
    );
    assert!(import_log.end.is_some());
}

struct DrainFiles {
    remaining: usize,
    invocations: usize,
}

#[async_trait]
impl Step for DrainFiles {
    fn name(&self) -> &'static str {
        "drain-files"
    }

    async fn run_step(&mut self, _ctx: &mut StepContext<'_>) -> Result<()> {
        self.invocations += 1;
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        Ok(())
    }

    fn have_more_files_to_process(&self) -> bool {
        self.remaining > 0
    }
}

#[tokio::test]
async fn test_run_steps_reinvokes_until_files_drained() {
    let db = test_db().await;
    let log_db = test_db().await;
    let runner = StepRunner::new(db, log_db.clone());

    let mut steps: Vec<Box<dyn Step>> = vec![Box::new(DrainFiles {
        remaining: 3,
        invocations: 0,
    })];
    run_steps(&runner, &mut steps).await.unwrap();

    // Each invocation is a separate import-log scope.
    let mut log_conn = log_db.acquire().await.unwrap();
    assert!(import_log_store::get_import_log(&mut log_conn, 3)
        .await
        .unwrap()
        .is_some());
    assert!(import_log_store::get_import_log(&mut log_conn, 4)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_run_steps_halts_sequence_on_error() {
    let db = test_db().await;
    let log_db = test_db().await;
    let runner = StepRunner::new(db, log_db.clone());

    let mut steps: Vec<Box<dyn Step>> = vec![
        Box::new(RecordOneTransition {
            end_state: State::PaymentValidated,
            fail_after_write: true,
        }),
        Box::new(DrainFiles {
            remaining: 0,
            invocations: 0,
        }),
    ];
    run_steps(&runner, &mut steps).await.unwrap_err();

    // The second step never started.
    let mut log_conn = log_db.acquire().await.unwrap();
    assert!(import_log_store::get_import_log(&mut log_conn, 2)
        .await
        .unwrap()
        .is_none());
}

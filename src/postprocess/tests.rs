use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::model::{
    AbsencePeriodKey, Claim, EntityClass, Flow, Outcome, Payment, PaymentAuditReportType,
    PaymentMethod, State, StateLogEntity, WritebackTransactionStatus,
};
use crate::pipeline::{LogEntry, Step, StepContext, StepError, StepRunner};
use crate::storage::{audit_store, claim_store, state_log_store, Database};
use crate::test_utils::{date, insert_payment, make_claim, make_employee, money, payment_fixture, test_db};

use super::{PaymentMethodSplitStep, PostProcessingStep};

async fn seed_claim_with_period(db: &Database) -> Claim {
    let mut conn = db.acquire().await.unwrap();
    let employee = make_employee(&mut conn, "987654321").await;
    let claim = make_claim(&mut conn, employee.employee_id, "NTN-100-ABS-01").await;
    claim_store::upsert_absence_period(
        &mut conn,
        claim.claim_id,
        AbsencePeriodKey {
            class_id: 14449,
            index_id: 1,
        },
        date(2022, 3, 1),
        date(2022, 4, 1),
    )
    .await
    .unwrap();
    claim
}

async fn seed_payment_in_state(db: &Database, claim_id: Uuid, amount: &str, state: State) -> Payment {
    let mut conn = db.acquire().await.unwrap();
    let payment = payment_fixture(claim_id, money(amount));
    insert_payment(&mut conn, &payment).await;
    state_log_store::create_state_log(
        &mut conn,
        state,
        None,
        StateLogEntity::Payment(payment.payment_id),
        None,
    )
    .await
    .unwrap();
    payment
}

async fn run_once(db: &Database, step: &mut dyn Step) {
    let mut log = LogEntry::detached(step.name());
    let mut conn = db.acquire().await.unwrap();
    let mut ctx = StepContext {
        conn: &mut *conn,
        log: &mut log,
    };
    step.run_step(&mut ctx).await.unwrap();
}

async fn payment_state(db: &Database, payment_id: Uuid) -> Option<State> {
    let mut conn = db.acquire().await.unwrap();
    state_log_store::get_latest_state_log_in_flow(
        &mut conn,
        &StateLogEntity::Payment(payment_id),
        Flow::DelegatedPayment,
    )
    .await
    .unwrap()
    .and_then(|log| log.end_state)
}

#[tokio::test]
async fn test_week_over_cap_flags_excess_payment_only() {
    let db = test_db().await;
    let claim = seed_claim_with_period(&db).await;
    let kept = seed_payment_in_state(&db, claim.claim_id, "500", State::PaymentValidated).await;
    let flagged = seed_payment_in_state(&db, claim.claim_id, "400", State::PaymentValidated).await;

    let config = PipelineConfig::default();
    let mut step = PostProcessingStep::new(&config);
    run_once(&db, &mut step).await;

    assert_eq!(payment_state(&db, kept.payment_id).await, Some(State::PaymentValidated));
    assert_eq!(
        payment_state(&db, flagged.payment_id).await,
        Some(State::PaymentFailedWeeklyCapValidation)
    );

    let mut conn = db.acquire().await.unwrap();
    let details = audit_store::list_unsent_audit_details(&mut conn).await.unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].payment_id, flagged.payment_id);
    assert_eq!(
        details[0].audit_report_type,
        PaymentAuditReportType::MaxWeeklyBenefits
    );

    let writebacks = audit_store::list_pending_writeback_details(&mut conn).await.unwrap();
    assert_eq!(writebacks.len(), 1);
    assert_eq!(writebacks[0].payment_id, flagged.payment_id);
    assert_eq!(
        writebacks[0].transaction_status,
        WritebackTransactionStatus::WeeklyBenefitsAmountExceeds850
    );
}

#[tokio::test]
async fn test_processed_amounts_count_against_the_cap() {
    let db = test_db().await;
    let claim = seed_claim_with_period(&db).await;
    // 500 already committed to a check file earlier in the week.
    seed_payment_in_state(&db, claim.claim_id, "500", State::PaymentAddToPubTransactionCheck).await;
    let new = seed_payment_in_state(&db, claim.claim_id, "600", State::PaymentValidated).await;

    let config = PipelineConfig::default();
    let mut step = PostProcessingStep::new(&config);
    run_once(&db, &mut step).await;

    assert_eq!(
        payment_state(&db, new.payment_id).await,
        Some(State::PaymentFailedWeeklyCapValidation)
    );

    // Fail-open: the flagged payment is still routed by the method split.
    let mut split = PaymentMethodSplitStep;
    run_once(&db, &mut split).await;
    assert_eq!(
        payment_state(&db, new.payment_id).await,
        Some(State::PaymentAddToPubTransactionCheck)
    );
}

#[tokio::test]
async fn test_date_mismatch_is_advisory() {
    let db = test_db().await;
    let claim = seed_claim_with_period(&db).await;
    let mut payment = payment_fixture(claim.claim_id, money("100"));
    payment.period_start_date = date(2022, 5, 2);
    payment.period_end_date = date(2022, 5, 8);
    {
        let mut conn = db.acquire().await.unwrap();
        insert_payment(&mut conn, &payment).await;
        state_log_store::create_state_log(
            &mut conn,
            State::PaymentValidated,
            None,
            StateLogEntity::Payment(payment.payment_id),
            None,
        )
        .await
        .unwrap();
    }

    let config = PipelineConfig::default();
    let mut step = PostProcessingStep::new(&config);
    run_once(&db, &mut step).await;

    // Audit row staged, payment-audit writeback pending, but the payment
    // stays eligible.
    assert_eq!(
        payment_state(&db, payment.payment_id).await,
        Some(State::PaymentValidated)
    );
    let mut conn = db.acquire().await.unwrap();
    let details = audit_store::list_unsent_audit_details(&mut conn).await.unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].audit_report_type, PaymentAuditReportType::DateMismatch);
    let writebacks = audit_store::list_pending_writeback_details(&mut conn).await.unwrap();
    assert_eq!(
        writebacks[0].transaction_status,
        WritebackTransactionStatus::PendingPaymentAudit
    );
}

#[tokio::test]
async fn test_method_split_routes_by_method() {
    let db = test_db().await;
    let claim = seed_claim_with_period(&db).await;
    let check = seed_payment_in_state(&db, claim.claim_id, "100", State::PaymentValidated).await;
    let mut ach = payment_fixture(claim.claim_id, money("200"));
    ach.payment_method = PaymentMethod::Ach;
    ach.routing_number = Some("211870935".to_string());
    ach.account_number = Some("123456789".to_string());
    {
        let mut conn = db.acquire().await.unwrap();
        insert_payment(&mut conn, &ach).await;
        state_log_store::create_state_log(
            &mut conn,
            State::PaymentValidated,
            None,
            StateLogEntity::Payment(ach.payment_id),
            None,
        )
        .await
        .unwrap();
    }

    let mut step = PaymentMethodSplitStep;
    run_once(&db, &mut step).await;

    assert_eq!(
        payment_state(&db, check.payment_id).await,
        Some(State::PaymentAddToPubTransactionCheck)
    );
    assert_eq!(
        payment_state(&db, ach.payment_id).await,
        Some(State::PaymentAddToPubTransactionEft)
    );
}

#[tokio::test]
async fn test_unexpected_method_rolls_back_whole_split() {
    let db = test_db().await;
    let log_db = test_db().await;
    let claim = seed_claim_with_period(&db).await;
    let good = seed_payment_in_state(&db, claim.claim_id, "100", State::PaymentValidated).await;
    let mut debit = payment_fixture(claim.claim_id, money("200"));
    debit.payment_method = PaymentMethod::Debit;
    {
        let mut conn = db.acquire().await.unwrap();
        insert_payment(&mut conn, &debit).await;
        state_log_store::create_state_log(
            &mut conn,
            State::PaymentValidated,
            Some(Outcome::message("escaped the extract filter")),
            StateLogEntity::Payment(debit.payment_id),
            None,
        )
        .await
        .unwrap();
    }

    let runner = StepRunner::new(db.clone(), log_db);
    let mut step = PaymentMethodSplitStep;
    let err = runner.run(&mut step).await.unwrap_err();
    assert!(matches!(err, StepError::Invariant(_)));

    // Neither payment moved: the good payment's transition rolled back
    // with the failing one.
    assert_eq!(payment_state(&db, good.payment_id).await, Some(State::PaymentValidated));
    assert_eq!(payment_state(&db, debit.payment_id).await, Some(State::PaymentValidated));

    let mut conn = db.acquire().await.unwrap();
    let routed = state_log_store::get_all_latest_state_logs_in_end_state(
        &mut conn,
        EntityClass::Payment,
        State::PaymentAddToPubTransactionCheck,
    )
    .await
    .unwrap();
    assert!(routed.is_empty());
}

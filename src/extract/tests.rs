use std::path::Path;

use rust_decimal::Decimal;

use crate::config::PipelineConfig;
use crate::model::{
    EntityClass, Flow, ReferenceFile, ReferenceFileType, State, StateLogEntity,
};
use crate::pipeline::{LogEntry, Step, StepContext};
use crate::storage::{
    audit_store, claim_store, employee_store, extract_store, payment_store, reference_file_store,
    state_log_store, Database,
};
use crate::test_utils::{staged_claimant_row, staged_payment_row, test_db};
use crate::validation::ValidationReason;

use super::{ClaimantExtractStep, PaymentExtractStep};

async fn seed_extract_file(
    db: &Database,
    received_dir: &Path,
    name: &str,
    file_type: ReferenceFileType,
) -> ReferenceFile {
    tokio::fs::create_dir_all(received_dir).await.unwrap();
    let location = received_dir.join(name);
    tokio::fs::write(&location, "extract\n").await.unwrap();
    let mut conn = db.acquire().await.unwrap();
    reference_file_store::create_reference_file(&mut conn, &location.to_string_lossy(), file_type)
        .await
        .unwrap()
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

#[tokio::test]
async fn test_claimant_extract_happy_path() {
    let db = test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    let file = seed_extract_file(
        &db,
        &config.received_dir,
        "claimant.csv",
        ReferenceFileType::ClaimantExtract,
    )
    .await;

    {
        let mut conn = db.acquire().await.unwrap();
        let row = staged_claimant_row(file.reference_file_id);
        extract_store::insert_staged_claimant_row(&mut conn, &row)
            .await
            .unwrap();
    }

    let mut step = ClaimantExtractStep::new(config.clone());
    run_once(&db, &mut step).await;

    let mut conn = db.acquire().await.unwrap();
    let employee = employee_store::get_employee_by_tax_identifier(&mut conn, "987654321")
        .await
        .unwrap()
        .expect("employee upserted");
    let claim = claim_store::get_claim_by_absence_case_number(&mut conn, "NTN-100-ABS-01")
        .await
        .unwrap()
        .expect("claim upserted");
    assert_eq!(claim.employee_id, employee.employee_id);
    let periods = claim_store::get_absence_periods(&mut conn, claim.claim_id)
        .await
        .unwrap();
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].key.class_id, 14449);

    let head = state_log_store::get_latest_state_log_in_flow(
        &mut conn,
        &StateLogEntity::Employee(employee.employee_id),
        Flow::DelegatedClaimant,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(head.end_state, Some(State::ClaimantExtracted));

    // File moved received -> processed, location updated in lockstep.
    let moved = reference_file_store::get_reference_file(&mut conn, file.reference_file_id)
        .await
        .unwrap()
        .unwrap();
    assert!(moved.file_location.starts_with(&*config.processed_dir.to_string_lossy()));
    assert!(Path::new(&moved.file_location).exists());
    assert!(!step.have_more_files_to_process());
}

#[tokio::test]
async fn test_claimant_row_with_missing_field_goes_to_error_report_state() {
    let db = test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    let file = seed_extract_file(
        &db,
        &config.received_dir,
        "claimant.csv",
        ReferenceFileType::ClaimantExtract,
    )
    .await;

    {
        let mut conn = db.acquire().await.unwrap();
        let mut row = staged_claimant_row(file.reference_file_id);
        row.last_name = None;
        extract_store::insert_staged_claimant_row(&mut conn, &row)
            .await
            .unwrap();
    }

    let mut step = ClaimantExtractStep::new(config);
    run_once(&db, &mut step).await;

    let mut conn = db.acquire().await.unwrap();
    let employee = employee_store::get_employee_by_tax_identifier(&mut conn, "987654321")
        .await
        .unwrap()
        .expect("employee still upserted for error keying");
    let head = state_log_store::get_latest_state_log_in_flow(
        &mut conn,
        &StateLogEntity::Employee(employee.employee_id),
        Flow::DelegatedClaimant,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(head.end_state, Some(State::ClaimantAddToClaimantErrorReport));
    let outcome = head.outcome.unwrap();
    assert_eq!(outcome.validation_issues.len(), 1);
    assert_eq!(outcome.validation_issues[0].reason, ValidationReason::MissingField);
    assert_eq!(outcome.validation_issues[0].details, "LASTNAME");

    // No partial claim data for the failed row.
    assert!(
        claim_store::get_claim_by_absence_case_number(&mut conn, "NTN-100-ABS-01")
            .await
            .unwrap()
            .is_none()
    );
}

async fn ingest_fixture_claimant(db: &Database, config: &PipelineConfig) {
    let file = seed_extract_file(
        db,
        &config.received_dir,
        "claimant.csv",
        ReferenceFileType::ClaimantExtract,
    )
    .await;
    {
        let mut conn = db.acquire().await.unwrap();
        let row = staged_claimant_row(file.reference_file_id);
        extract_store::insert_staged_claimant_row(&mut conn, &row)
            .await
            .unwrap();
    }
    let mut step = ClaimantExtractStep::new(config.clone());
    run_once(db, &mut step).await;
}

#[tokio::test]
async fn test_payment_extract_sums_lines_into_one_payment() {
    let db = test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    ingest_fixture_claimant(&db, &config).await;

    let file = seed_extract_file(
        &db,
        &config.received_dir,
        "payment.csv",
        ReferenceFileType::PaymentExtract,
    )
    .await;
    {
        let mut conn = db.acquire().await.unwrap();
        let mut line_one = staged_payment_row(file.reference_file_id);
        line_one.amount = Some("500.25".to_string());
        let mut line_two = staged_payment_row(file.reference_file_id);
        line_two.amount = Some("250.42".to_string());
        line_two.period_start = Some("2022-03-09".to_string());
        line_two.period_end = Some("2022-03-15".to_string());
        extract_store::insert_staged_payment_row(&mut conn, &line_one)
            .await
            .unwrap();
        extract_store::insert_staged_payment_row(&mut conn, &line_two)
            .await
            .unwrap();
    }

    let mut step = PaymentExtractStep::new(config);
    run_once(&db, &mut step).await;

    let mut conn = db.acquire().await.unwrap();
    let validated = state_log_store::get_all_latest_state_logs_in_end_state(
        &mut conn,
        EntityClass::Payment,
        State::PaymentValidated,
    )
    .await
    .unwrap();
    assert_eq!(validated.len(), 1);
    let StateLogEntity::Payment(payment_id) = validated[0].require_entity().unwrap() else {
        panic!("payment entity expected");
    };
    let payment = payment_store::get_payment(&mut conn, payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.amount, "750.67".parse::<Decimal>().unwrap());
    assert_eq!(payment.period_start_date, crate::test_utils::date(2022, 3, 7));
    assert_eq!(payment.period_end_date, crate::test_utils::date(2022, 3, 15));
    assert!(payment.claim_id.is_some());

    // The payment is linked back to the extract file that produced it.
    let linked = reference_file_store::linked_payments(&mut conn, file.reference_file_id)
        .await
        .unwrap();
    assert_eq!(linked, vec![payment_id]);
}

#[tokio::test]
async fn test_payment_with_unknown_claim_routes_to_error_report() {
    let db = test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    // No claimant ingest: the claim is unknown.

    let file = seed_extract_file(
        &db,
        &config.received_dir,
        "payment.csv",
        ReferenceFileType::PaymentExtract,
    )
    .await;
    {
        let mut conn = db.acquire().await.unwrap();
        let row = staged_payment_row(file.reference_file_id);
        extract_store::insert_staged_payment_row(&mut conn, &row)
            .await
            .unwrap();
    }

    let mut step = PaymentExtractStep::new(config);
    run_once(&db, &mut step).await;

    let mut conn = db.acquire().await.unwrap();
    let errored = state_log_store::get_all_latest_state_logs_in_end_state(
        &mut conn,
        EntityClass::Payment,
        State::PaymentAddToErrorReport,
    )
    .await
    .unwrap();
    assert_eq!(errored.len(), 1);
    let outcome = errored[0].outcome.clone().unwrap();
    assert!(outcome
        .validation_issues
        .iter()
        .any(|issue| issue.reason == ValidationReason::ClaimNotFound));

    let StateLogEntity::Payment(payment_id) = errored[0].require_entity().unwrap() else {
        panic!("payment entity expected");
    };
    let payment = payment_store::get_payment(&mut conn, payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.claim_id, None);

    // Queued for the payment error report.
    let queued = audit_store::queued_sources(&mut conn).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].1, crate::report::SOURCE_PAYMENT_ERROR_REPORT);
}

#[tokio::test]
async fn test_one_file_per_invocation_with_backpressure() {
    let db = test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    seed_extract_file(
        &db,
        &config.received_dir,
        "payment-1.csv",
        ReferenceFileType::PaymentExtract,
    )
    .await;
    seed_extract_file(
        &db,
        &config.received_dir,
        "payment-2.csv",
        ReferenceFileType::PaymentExtract,
    )
    .await;

    let mut step = PaymentExtractStep::new(config.clone());
    run_once(&db, &mut step).await;
    assert!(step.have_more_files_to_process());

    run_once(&db, &mut step).await;
    assert!(!step.have_more_files_to_process());

    let mut conn = db.acquire().await.unwrap();
    let remaining = super::pending_extract_files(
        &mut conn,
        ReferenceFileType::PaymentExtract,
        &config.received_dir,
    )
    .await
    .unwrap();
    assert!(remaining.is_empty());
}

//! Full pipeline run over staged extracts: claimant ingestion, payment
//! validation, check disbursement, status writeback and reports.

use rust_decimal::Decimal;

use leavepay::config::PipelineConfig;
use leavepay::extract::{ClaimantExtractStep, PaymentExtractStep};
use leavepay::model::{
    EntityClass, Flow, ReferenceFileType, StagedClaimantRow, StagedPaymentRow, State,
    StateLogEntity,
};
use leavepay::outbound::{
    CheckIssueStep, EftStep, ErrorReportKind, ErrorReportStep, WritebackStep,
};
use leavepay::pipeline::{run_steps, Step, StepRunner};
use leavepay::postprocess::{PaymentMethodSplitStep, PostProcessingStep};
use leavepay::report::ReportStep;
use leavepay::storage::{
    claim_store, extract_store, payment_store, reference_file_store, state_log_store, Database,
};

async fn seed_extracts(db: &Database, config: &PipelineConfig) {
    tokio::fs::create_dir_all(&config.received_dir).await.unwrap();
    let mut conn = db.acquire().await.unwrap();

    let claimant_path = config.received_dir.join("2022-03-14-claimant-extract.csv");
    tokio::fs::write(&claimant_path, "staged upstream\n").await.unwrap();
    let claimant_file = reference_file_store::create_reference_file(
        &mut conn,
        &claimant_path.to_string_lossy(),
        ReferenceFileType::ClaimantExtract,
    )
    .await
    .unwrap();
    extract_store::insert_staged_claimant_row(
        &mut conn,
        &StagedClaimantRow {
            staged_claimant_row_id: 0,
            reference_file_id: claimant_file.reference_file_id,
            import_log_id: None,
            absence_case_number: Some("NTN-100-ABS-01".to_string()),
            absence_period_index: Some("PL-14449-1".to_string()),
            tax_identifier: Some("987654321".to_string()),
            first_name: Some("ALICE".to_string()),
            last_name: Some("HALVORSEN".to_string()),
            absence_period_start: Some("2022-03-07".to_string()),
            absence_period_end: Some("2022-04-01".to_string()),
            payment_method: Some("Check".to_string()),
            routing_number: None,
            account_number: None,
        },
    )
    .await
    .unwrap();

    let payment_path = config.received_dir.join("2022-03-14-payment-extract.csv");
    tokio::fs::write(&payment_path, "staged upstream\n").await.unwrap();
    let payment_file = reference_file_store::create_reference_file(
        &mut conn,
        &payment_path.to_string_lossy(),
        ReferenceFileType::PaymentExtract,
    )
    .await
    .unwrap();
    // Two vendor lines for the same C/I pair; the pipeline sums them.
    for amount in ["400.00", "350.67"] {
        extract_store::insert_staged_payment_row(
            &mut conn,
            &StagedPaymentRow {
                staged_payment_row_id: 0,
                reference_file_id: payment_file.reference_file_id,
                import_log_id: None,
                pei_c_value: Some("7326".to_string()),
                pei_i_value: Some("301".to_string()),
                absence_case_number: Some("NTN-100-ABS-01".to_string()),
                period_start: Some("2022-03-07".to_string()),
                period_end: Some("2022-03-13".to_string()),
                amount: Some(amount.to_string()),
                payment_method: Some("Check".to_string()),
                is_adhoc: Some("N".to_string()),
                payee_name: Some("ALICE HALVORSEN".to_string()),
            },
        )
        .await
        .unwrap();
    }
}

fn full_sequence(config: &PipelineConfig) -> Vec<Box<dyn Step>> {
    vec![
        Box::new(ClaimantExtractStep::new(config.clone())),
        Box::new(PaymentExtractStep::new(config.clone())),
        Box::new(PostProcessingStep::new(config)),
        Box::new(PaymentMethodSplitStep),
        Box::new(CheckIssueStep::new(config.clone())),
        Box::new(EftStep::new(config.clone())),
        Box::new(WritebackStep::new(config.clone())),
        Box::new(ErrorReportStep::new(ErrorReportKind::Claimant, config.clone())),
        Box::new(ErrorReportStep::new(ErrorReportKind::Payment, config.clone())),
        Box::new(ReportStep::new(config.clone())),
    ]
}

async fn dir_file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    names
}

#[tokio::test]
async fn test_check_payment_travels_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    let db = Database::connect_in_memory().await.unwrap();
    let log_db = Database::connect_in_memory().await.unwrap();
    db.init_schema().await.unwrap();
    log_db.init_schema().await.unwrap();
    seed_extracts(&db, &config).await;

    let runner = StepRunner::new(db.clone(), log_db.clone());
    let mut steps = full_sequence(&config);
    run_steps(&runner, &mut steps).await.unwrap();

    let mut conn = db.acquire().await.unwrap();

    // Claimant ingestion produced the claim.
    let claim = claim_store::get_claim_by_absence_case_number(&mut conn, "NTN-100-ABS-01")
        .await
        .unwrap()
        .expect("claim created from claimant extract");

    // Exactly one payment, summed across the two lines, fully disbursed.
    let completed = state_log_store::get_all_latest_state_logs_in_end_state(
        &mut conn,
        EntityClass::Payment,
        State::PaymentComplete,
    )
    .await
    .unwrap();
    assert_eq!(completed.len(), 1);
    let Ok(StateLogEntity::Payment(payment_id)) = completed[0].require_entity() else {
        panic!("completed state log has no payment");
    };
    let payment = payment_store::get_payment(&mut conn, payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.claim_id, Some(claim.claim_id));
    assert_eq!(payment.amount, "750.67".parse::<Decimal>().unwrap());
    assert_eq!(payment.check_number, Some(1001));

    // The paid status went out on the writeback.
    let writeback_state = state_log_store::get_latest_state_log_in_flow(
        &mut conn,
        &StateLogEntity::Payment(payment_id),
        Flow::DelegatedPeiWriteback,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(writeback_state.end_state, Some(State::WritebackSent));
    drop(conn);

    // Both extracts were consumed and the outbound artifacts exist.
    let processed = dir_file_names(&config.processed_dir).await;
    assert_eq!(
        processed,
        vec![
            "2022-03-14-claimant-extract.csv".to_string(),
            "2022-03-14-payment-extract.csv".to_string(),
        ]
    );
    let outbound = dir_file_names(&config.outbound_dir).await;
    assert!(outbound.iter().any(|n| n.starts_with("PUB-CHECK-")));
    assert!(outbound.iter().any(|n| n.starts_with("STATUS-WRITEBACK-")));
    assert!(!outbound.iter().any(|n| n.starts_with("PUB-EFT-")));
    let reports = dir_file_names(&config.outbound_dir.join("reports")).await;
    assert!(reports.iter().any(|n| n.starts_with("state-summary-")));

    // Each step opened an import log in the independent log database.
    let mut log_conn = log_db.acquire().await.unwrap();
    let first = leavepay::storage::import_log_store::get_import_log(&mut log_conn, 1)
        .await
        .unwrap()
        .expect("import logs recorded");
    assert_eq!(first.source, "claimant-extract");
}

#[tokio::test]
async fn test_unknown_claim_routes_to_error_report_not_disbursement() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    let db = Database::connect_in_memory().await.unwrap();
    let log_db = Database::connect_in_memory().await.unwrap();
    db.init_schema().await.unwrap();
    log_db.init_schema().await.unwrap();

    // Payment extract only: the referenced absence case was never ingested.
    tokio::fs::create_dir_all(&config.received_dir).await.unwrap();
    {
        let mut conn = db.acquire().await.unwrap();
        let payment_path = config.received_dir.join("2022-03-14-payment-extract.csv");
        tokio::fs::write(&payment_path, "staged upstream\n").await.unwrap();
        let payment_file = reference_file_store::create_reference_file(
            &mut conn,
            &payment_path.to_string_lossy(),
            ReferenceFileType::PaymentExtract,
        )
        .await
        .unwrap();
        extract_store::insert_staged_payment_row(
            &mut conn,
            &StagedPaymentRow {
                staged_payment_row_id: 0,
                reference_file_id: payment_file.reference_file_id,
                import_log_id: None,
                pei_c_value: Some("7326".to_string()),
                pei_i_value: Some("999".to_string()),
                absence_case_number: Some("NTN-404-ABS-01".to_string()),
                period_start: Some("2022-03-07".to_string()),
                period_end: Some("2022-03-13".to_string()),
                amount: Some("100.00".to_string()),
                payment_method: Some("Check".to_string()),
                is_adhoc: Some("N".to_string()),
                payee_name: Some("ALICE HALVORSEN".to_string()),
            },
        )
        .await
        .unwrap();
    }

    let runner = StepRunner::new(db.clone(), log_db);
    let mut steps = full_sequence(&config);
    run_steps(&runner, &mut steps).await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    let reported = state_log_store::get_all_latest_state_logs_in_end_state(
        &mut conn,
        EntityClass::Payment,
        State::PaymentErrorReportSent,
    )
    .await
    .unwrap();
    assert_eq!(reported.len(), 1);
    drop(conn);

    let outbound = dir_file_names(&config.outbound_dir).await;
    assert!(outbound.iter().any(|n| n.starts_with("PAYMENT-ERROR-REPORT-")));
    assert!(!outbound.iter().any(|n| n.starts_with("PUB-CHECK-")));
    assert!(!outbound.iter().any(|n| n.starts_with("STATUS-WRITEBACK-")));
}

use crate::config::PipelineConfig;
use crate::model::{Outcome, PaymentAuditReportType, State, StateLogEntity};
use crate::pipeline::{LogEntry, Step, StepContext};
use crate::storage::{audit_store, state_log_store, Database};
use crate::test_utils::{insert_payment, make_claim, make_employee, money, payment_fixture, test_db};
use crate::validation::{ValidationIssue, ValidationReason};

use super::{
    ReportDefinition, ReportStep, SOURCE_AUDIT_REPORT, SOURCE_PAYMENT_ERROR_REPORT,
};

async fn run_once(db: &Database, step: &mut dyn Step) -> crate::pipeline::Result<()> {
    let mut log = LogEntry::detached(step.name());
    let mut conn = db.acquire().await.unwrap();
    let mut ctx = StepContext {
        conn: &mut *conn,
        log: &mut log,
    };
    step.run_step(&mut ctx).await
}

async fn seed_errored_and_audited_payments(db: &Database) {
    let mut conn = db.acquire().await.unwrap();
    let employee = make_employee(&mut conn, "987654321").await;
    let claim = make_claim(&mut conn, employee.employee_id, "NTN-100-ABS-01").await;

    // One payment on the error path.
    let errored = payment_fixture(claim.claim_id, money("750.67"));
    insert_payment(&mut conn, &errored).await;
    let outcome = Outcome::with_issues(
        "7326 / 301: payment failed extract validation",
        vec![ValidationIssue {
            reason: ValidationReason::InvalidValue,
            details: "PAYMENTMETHOD: Debit".to_string(),
        }],
    );
    state_log_store::create_state_log(
        &mut conn,
        State::PaymentAddToErrorReport,
        Some(outcome),
        StateLogEntity::Payment(errored.payment_id),
        None,
    )
    .await
    .unwrap();
    audit_store::add_to_report_queue(&mut conn, Some(errored.payment_id), SOURCE_PAYMENT_ERROR_REPORT)
        .await
        .unwrap();

    // One payment with an audit finding.
    let audited = payment_fixture(claim.claim_id, money("900"));
    insert_payment(&mut conn, &audited).await;
    state_log_store::create_state_log(
        &mut conn,
        State::PaymentValidated,
        None,
        StateLogEntity::Payment(audited.payment_id),
        None,
    )
    .await
    .unwrap();
    audit_store::stage_audit_report_detail(
        &mut conn,
        audited.payment_id,
        PaymentAuditReportType::MaxWeeklyBenefits,
        "week of 2022-03-07: total 900 exceeds cap 850 (0 locked)",
        None,
    )
    .await
    .unwrap();
    audit_store::add_to_report_queue(&mut conn, Some(audited.payment_id), SOURCE_AUDIT_REPORT)
        .await
        .unwrap();
}

async fn report_files(config: &PipelineConfig) -> Vec<String> {
    let dir = config.outbound_dir.join("reports");
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}

#[tokio::test]
async fn test_reports_export_and_clear_queue() {
    let db = test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    seed_errored_and_audited_payments(&db).await;

    let mut step = ReportStep::new(config.clone());
    run_once(&db, &mut step).await.unwrap();

    let names = report_files(&config).await;
    assert!(names.iter().any(|n| n.starts_with("payment-error-report-")));
    assert!(names.iter().any(|n| n.starts_with("payment-audit-report-")));
    assert!(names.iter().any(|n| n.starts_with("state-summary-")));
    // No claimant failed, so no claimant report file.
    assert!(!names.iter().any(|n| n.starts_with("claimant-error-report-")));

    let error_report = names
        .iter()
        .find(|n| n.starts_with("payment-error-report-"))
        .unwrap();
    let contents = tokio::fs::read_to_string(config.outbound_dir.join("reports").join(error_report))
        .await
        .unwrap();
    assert!(contents.starts_with(
        "pei_c_value,pei_i_value,amount,period_start_date,period_end_date,payment_method,end_state,outcome\n"
    ));
    assert!(contents.contains("750.67"));

    let mut conn = db.acquire().await.unwrap();
    assert!(audit_store::queued_sources(&mut conn).await.unwrap().is_empty());
    assert!(audit_store::list_unsent_audit_details(&mut conn)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_failing_report_leaves_all_sources_queued() {
    let db = test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::for_test(dir.path());
    seed_errored_and_audited_payments(&db).await;

    let definitions = vec![
        ReportDefinition {
            name: "payment-error-report".to_string(),
            sql: super::ReportName::PaymentErrorReport.sql().to_string(),
            source_to_clear: Some(SOURCE_PAYMENT_ERROR_REPORT.to_string()),
            marks_audit_details_sent: false,
        },
        ReportDefinition {
            name: "broken".to_string(),
            sql: "SELECT * FROM no_such_table".to_string(),
            source_to_clear: Some(SOURCE_AUDIT_REPORT.to_string()),
            marks_audit_details_sent: true,
        },
    ];
    let mut step = ReportStep::with_definitions(config, definitions);
    run_once(&db, &mut step).await.unwrap_err();

    // The first report ran, but no source was cleared: both entries wait
    // for the next run.
    let mut conn = db.acquire().await.unwrap();
    let sources: Vec<String> = audit_store::queued_sources(&mut conn)
        .await
        .unwrap()
        .into_iter()
        .map(|(_, source)| source)
        .collect();
    assert_eq!(
        sources,
        vec![
            SOURCE_PAYMENT_ERROR_REPORT.to_string(),
            SOURCE_AUDIT_REPORT.to_string(),
        ]
    );
    assert_eq!(
        audit_store::list_unsent_audit_details(&mut conn)
            .await
            .unwrap()
            .len(),
        1
    );
}

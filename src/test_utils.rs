//! Shared test fixtures and factories.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::model::{
    Claim, Employee, Payment, PaymentMethod, StagedClaimantRow, StagedPaymentRow,
};
use crate::storage::{claim_store, employee_store, payment_store, Database};

/// Fresh in-memory database with the full schema applied.
pub async fn test_db() -> Database {
    let db = Database::connect_in_memory()
        .await
        .expect("in-memory database");
    db.init_schema().await.expect("schema");
    db
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn money(value: &str) -> Decimal {
    value.parse().expect("valid decimal")
}

pub async fn make_employee(conn: &mut SqliteConnection, tax_identifier: &str) -> Employee {
    employee_store::upsert_employee(conn, tax_identifier, "ALICE", "HALVORSEN", None, None)
        .await
        .expect("employee")
}

pub async fn make_claim(
    conn: &mut SqliteConnection,
    employee_id: Uuid,
    absence_case_number: &str,
) -> Claim {
    claim_store::upsert_claim(conn, employee_id, absence_case_number)
        .await
        .expect("claim")
}

/// A check payment for one benefit week with sensible defaults. Callers
/// override fields on the returned value before inserting variants.
pub fn payment_fixture(claim_id: Uuid, amount: Decimal) -> Payment {
    Payment {
        payment_id: Uuid::new_v4(),
        claim_id: Some(claim_id),
        pei_c_value: "7326".to_string(),
        pei_i_value: Uuid::new_v4().simple().to_string(),
        period_start_date: date(2022, 3, 7),
        period_end_date: date(2022, 3, 13),
        amount,
        payment_method: PaymentMethod::Check,
        is_adhoc_payment: false,
        payee_name: Some("ALICE HALVORSEN".to_string()),
        routing_number: None,
        account_number: None,
        check_number: None,
        import_log_id: None,
    }
}

pub async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) {
    payment_store::insert_payment(conn, payment)
        .await
        .expect("payment insert");
}

/// A fully populated claimant extract row; tests blank out fields to
/// exercise validation.
pub fn staged_claimant_row(reference_file_id: Uuid) -> StagedClaimantRow {
    StagedClaimantRow {
        staged_claimant_row_id: 0,
        reference_file_id,
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
    }
}

/// A fully populated payment extract row for the same fixture claim.
pub fn staged_payment_row(reference_file_id: Uuid) -> StagedPaymentRow {
    StagedPaymentRow {
        staged_payment_row_id: 0,
        reference_file_id,
        import_log_id: None,
        pei_c_value: Some("7326".to_string()),
        pei_i_value: Some("301".to_string()),
        absence_case_number: Some("NTN-100-ABS-01".to_string()),
        period_start: Some("2022-03-07".to_string()),
        period_end: Some("2022-03-13".to_string()),
        amount: Some("750.67".to_string()),
        payment_method: Some("Check".to_string()),
        is_adhoc: Some("N".to_string()),
        payee_name: Some("ALICE HALVORSEN".to_string()),
    }
}

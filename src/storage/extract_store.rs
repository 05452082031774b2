//! Staged extract rows.
//!
//! The upstream file-to-table loader lands raw extract rows here; the
//! pipeline reads them and derives domain entities, never mutating the
//! raw rows. The insert functions exist for the loader's contract and
//! for test fixtures.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::{StagedClaimantRow, StagedPaymentRow};

use super::helpers::get_uuid;
use super::schema::{StagedClaimantRows, StagedPaymentRows};
use super::Result;

fn decode_claimant_row(row: &SqliteRow) -> Result<StagedClaimantRow> {
    Ok(StagedClaimantRow {
        staged_claimant_row_id: row.try_get("staged_claimant_row_id")?,
        reference_file_id: get_uuid(row, "reference_file_id")?,
        import_log_id: row.try_get("import_log_id")?,
        absence_case_number: row.try_get("absence_case_number")?,
        absence_period_index: row.try_get("absence_period_index")?,
        tax_identifier: row.try_get("tax_identifier")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        absence_period_start: row.try_get("absence_period_start")?,
        absence_period_end: row.try_get("absence_period_end")?,
        payment_method: row.try_get("payment_method")?,
        routing_number: row.try_get("routing_number")?,
        account_number: row.try_get("account_number")?,
    })
}

pub async fn fetch_staged_claimant_rows(
    conn: &mut SqliteConnection,
    reference_file_id: Uuid,
) -> Result<Vec<StagedClaimantRow>> {
    let sql = Query::select()
        .columns([
            StagedClaimantRows::StagedClaimantRowId,
            StagedClaimantRows::ReferenceFileId,
            StagedClaimantRows::ImportLogId,
            StagedClaimantRows::AbsenceCaseNumber,
            StagedClaimantRows::AbsencePeriodIndex,
            StagedClaimantRows::TaxIdentifier,
            StagedClaimantRows::FirstName,
            StagedClaimantRows::LastName,
            StagedClaimantRows::AbsencePeriodStart,
            StagedClaimantRows::AbsencePeriodEnd,
            StagedClaimantRows::PaymentMethod,
            StagedClaimantRows::RoutingNumber,
            StagedClaimantRows::AccountNumber,
        ])
        .from(StagedClaimantRows::Table)
        .and_where(
            Expr::col(StagedClaimantRows::ReferenceFileId).eq(reference_file_id.to_string()),
        )
        .order_by(StagedClaimantRows::StagedClaimantRowId, Order::Asc)
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(decode_claimant_row).collect()
}

pub async fn insert_staged_claimant_row(
    conn: &mut SqliteConnection,
    row: &StagedClaimantRow,
) -> Result<i64> {
    let sql = Query::insert()
        .into_table(StagedClaimantRows::Table)
        .columns([
            StagedClaimantRows::ReferenceFileId,
            StagedClaimantRows::ImportLogId,
            StagedClaimantRows::AbsenceCaseNumber,
            StagedClaimantRows::AbsencePeriodIndex,
            StagedClaimantRows::TaxIdentifier,
            StagedClaimantRows::FirstName,
            StagedClaimantRows::LastName,
            StagedClaimantRows::AbsencePeriodStart,
            StagedClaimantRows::AbsencePeriodEnd,
            StagedClaimantRows::PaymentMethod,
            StagedClaimantRows::RoutingNumber,
            StagedClaimantRows::AccountNumber,
        ])
        .values_panic([
            row.reference_file_id.to_string().into(),
            row.import_log_id.into(),
            row.absence_case_number.clone().into(),
            row.absence_period_index.clone().into(),
            row.tax_identifier.clone().into(),
            row.first_name.clone().into(),
            row.last_name.clone().into(),
            row.absence_period_start.clone().into(),
            row.absence_period_end.clone().into(),
            row.payment_method.clone().into(),
            row.routing_number.clone().into(),
            row.account_number.clone().into(),
        ])
        .to_string(SqliteQueryBuilder);
    Ok(sqlx::query(&sql).execute(&mut *conn).await?.last_insert_rowid())
}

fn decode_payment_row(row: &SqliteRow) -> Result<StagedPaymentRow> {
    Ok(StagedPaymentRow {
        staged_payment_row_id: row.try_get("staged_payment_row_id")?,
        reference_file_id: get_uuid(row, "reference_file_id")?,
        import_log_id: row.try_get("import_log_id")?,
        pei_c_value: row.try_get("pei_c_value")?,
        pei_i_value: row.try_get("pei_i_value")?,
        absence_case_number: row.try_get("absence_case_number")?,
        period_start: row.try_get("period_start")?,
        period_end: row.try_get("period_end")?,
        amount: row.try_get("amount")?,
        payment_method: row.try_get("payment_method")?,
        is_adhoc: row.try_get("is_adhoc")?,
        payee_name: row.try_get("payee_name")?,
    })
}

pub async fn fetch_staged_payment_rows(
    conn: &mut SqliteConnection,
    reference_file_id: Uuid,
) -> Result<Vec<StagedPaymentRow>> {
    let sql = Query::select()
        .columns([
            StagedPaymentRows::StagedPaymentRowId,
            StagedPaymentRows::ReferenceFileId,
            StagedPaymentRows::ImportLogId,
            StagedPaymentRows::PeiCValue,
            StagedPaymentRows::PeiIValue,
            StagedPaymentRows::AbsenceCaseNumber,
            StagedPaymentRows::PeriodStart,
            StagedPaymentRows::PeriodEnd,
            StagedPaymentRows::Amount,
            StagedPaymentRows::PaymentMethod,
            StagedPaymentRows::IsAdhoc,
            StagedPaymentRows::PayeeName,
        ])
        .from(StagedPaymentRows::Table)
        .and_where(Expr::col(StagedPaymentRows::ReferenceFileId).eq(reference_file_id.to_string()))
        .order_by(StagedPaymentRows::StagedPaymentRowId, Order::Asc)
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(decode_payment_row).collect()
}

pub async fn insert_staged_payment_row(
    conn: &mut SqliteConnection,
    row: &StagedPaymentRow,
) -> Result<i64> {
    let sql = Query::insert()
        .into_table(StagedPaymentRows::Table)
        .columns([
            StagedPaymentRows::ReferenceFileId,
            StagedPaymentRows::ImportLogId,
            StagedPaymentRows::PeiCValue,
            StagedPaymentRows::PeiIValue,
            StagedPaymentRows::AbsenceCaseNumber,
            StagedPaymentRows::PeriodStart,
            StagedPaymentRows::PeriodEnd,
            StagedPaymentRows::Amount,
            StagedPaymentRows::PaymentMethod,
            StagedPaymentRows::IsAdhoc,
            StagedPaymentRows::PayeeName,
        ])
        .values_panic([
            row.reference_file_id.to_string().into(),
            row.import_log_id.into(),
            row.pei_c_value.clone().into(),
            row.pei_i_value.clone().into(),
            row.absence_case_number.clone().into(),
            row.period_start.clone().into(),
            row.period_end.clone().into(),
            row.amount.clone().into(),
            row.payment_method.clone().into(),
            row.is_adhoc.clone().into(),
            row.payee_name.clone().into(),
        ])
        .to_string(SqliteQueryBuilder);
    Ok(sqlx::query(&sql).execute(&mut *conn).await?.last_insert_rowid())
}

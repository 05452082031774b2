//! Payment rows.

use chrono::NaiveDate;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::{Payment, PaymentMethod};

use super::helpers::{format_date, get_date, get_decimal, get_opt_uuid, get_uuid};
use super::schema::{Claims, Payments};
use super::{Result, StorageError};

const PAYMENT_COLUMNS: [Payments; 14] = [
    Payments::PaymentId,
    Payments::ClaimId,
    Payments::PeiCValue,
    Payments::PeiIValue,
    Payments::PeriodStartDate,
    Payments::PeriodEndDate,
    Payments::Amount,
    Payments::PaymentMethod,
    Payments::IsAdhocPayment,
    Payments::PayeeName,
    Payments::RoutingNumber,
    Payments::AccountNumber,
    Payments::CheckNumber,
    Payments::ImportLogId,
];

fn decode_payment(row: &SqliteRow) -> Result<Payment> {
    let method_str: String = row.try_get("payment_method")?;
    let payment_method =
        PaymentMethod::from_extract_str(&method_str).ok_or(StorageError::UnknownEnumValue {
            kind: "payment method",
            value: method_str,
        })?;
    let is_adhoc: i64 = row.try_get("is_adhoc_payment")?;

    Ok(Payment {
        payment_id: get_uuid(row, "payment_id")?,
        claim_id: get_opt_uuid(row, "claim_id")?,
        pei_c_value: row.try_get("pei_c_value")?,
        pei_i_value: row.try_get("pei_i_value")?,
        period_start_date: get_date(row, "period_start_date")?,
        period_end_date: get_date(row, "period_end_date")?,
        amount: get_decimal(row, "amount")?,
        payment_method,
        is_adhoc_payment: is_adhoc != 0,
        payee_name: row.try_get("payee_name")?,
        routing_number: row.try_get("routing_number")?,
        account_number: row.try_get("account_number")?,
        check_number: row.try_get("check_number")?,
        import_log_id: row.try_get("import_log_id")?,
    })
}

pub async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> Result<()> {
    let sql = Query::insert()
        .into_table(Payments::Table)
        .columns(PAYMENT_COLUMNS)
        .values_panic([
            payment.payment_id.to_string().into(),
            payment.claim_id.map(|id| id.to_string()).into(),
            payment.pei_c_value.clone().into(),
            payment.pei_i_value.clone().into(),
            format_date(payment.period_start_date).into(),
            format_date(payment.period_end_date).into(),
            payment.amount.to_string().into(),
            payment.payment_method.as_str().into(),
            (payment.is_adhoc_payment as i64).into(),
            payment.payee_name.clone().into(),
            payment.routing_number.clone().into(),
            payment.account_number.clone().into(),
            payment.check_number.into(),
            payment.import_log_id.into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

pub async fn get_payment(conn: &mut SqliteConnection, payment_id: Uuid) -> Result<Option<Payment>> {
    let sql = Query::select()
        .columns(PAYMENT_COLUMNS)
        .from(Payments::Table)
        .and_where(Expr::col(Payments::PaymentId).eq(payment_id.to_string()))
        .to_string(SqliteQueryBuilder);
    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(decode_payment).transpose()
}

/// All payments for an employee whose period start falls in
/// `[week_start, week_end]`, ordered by creation. Used by the weekly
/// benefit cap check, which must group per employee per benefit week.
pub async fn get_payments_for_employee_in_week(
    conn: &mut SqliteConnection,
    employee_id: Uuid,
    week_start: NaiveDate,
    week_end: NaiveDate,
) -> Result<Vec<Payment>> {
    let sql = Query::select()
        .columns(
            PAYMENT_COLUMNS.map(|column| (Payments::Table, column)),
        )
        .from(Payments::Table)
        .inner_join(
            Claims::Table,
            Expr::col((Payments::Table, Payments::ClaimId))
                .equals((Claims::Table, Claims::ClaimId)),
        )
        .and_where(Expr::col((Claims::Table, Claims::EmployeeId)).eq(employee_id.to_string()))
        .and_where(
            Expr::col((Payments::Table, Payments::PeriodStartDate)).gte(format_date(week_start)),
        )
        .and_where(
            Expr::col((Payments::Table, Payments::PeriodStartDate)).lte(format_date(week_end)),
        )
        .order_by_expr(Expr::cust("payments.rowid"), Order::Asc)
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(decode_payment).collect()
}

/// Assign a PUB check number to a payment.
pub async fn set_check_number(
    conn: &mut SqliteConnection,
    payment_id: Uuid,
    check_number: i64,
) -> Result<()> {
    let sql = Query::update()
        .table(Payments::Table)
        .value(Payments::CheckNumber, check_number)
        .and_where(Expr::col(Payments::PaymentId).eq(payment_id.to_string()))
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// Highest check number issued so far, if any.
pub async fn max_check_number(conn: &mut SqliteConnection) -> Result<Option<i64>> {
    let sql = Query::select()
        .expr(Expr::col(Payments::CheckNumber).max())
        .from(Payments::Table)
        .to_string(SqliteQueryBuilder);
    let row = sqlx::query(&sql).fetch_one(&mut *conn).await?;
    Ok(row.try_get(0)?)
}

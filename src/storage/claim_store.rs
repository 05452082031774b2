//! Claim and absence period lookups and upserts.

use chrono::NaiveDate;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::{AbsencePeriod, AbsencePeriodKey, Claim};

use super::helpers::{format_date, get_date, get_uuid};
use super::schema::{AbsencePeriods, Claims};
use super::Result;

fn decode_claim(row: &SqliteRow) -> Result<Claim> {
    Ok(Claim {
        claim_id: get_uuid(row, "claim_id")?,
        employee_id: get_uuid(row, "employee_id")?,
        absence_case_number: row.try_get("absence_case_number")?,
    })
}

pub async fn get_claim(conn: &mut SqliteConnection, claim_id: Uuid) -> Result<Option<Claim>> {
    let sql = Query::select()
        .columns([Claims::ClaimId, Claims::EmployeeId, Claims::AbsenceCaseNumber])
        .from(Claims::Table)
        .and_where(Expr::col(Claims::ClaimId).eq(claim_id.to_string()))
        .to_string(SqliteQueryBuilder);
    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(decode_claim).transpose()
}

pub async fn get_claim_by_absence_case_number(
    conn: &mut SqliteConnection,
    absence_case_number: &str,
) -> Result<Option<Claim>> {
    let sql = Query::select()
        .columns([Claims::ClaimId, Claims::EmployeeId, Claims::AbsenceCaseNumber])
        .from(Claims::Table)
        .and_where(Expr::col(Claims::AbsenceCaseNumber).eq(absence_case_number))
        .to_string(SqliteQueryBuilder);
    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(decode_claim).transpose()
}

/// Insert or fetch the claim for an absence case. The case number is the
/// stable natural key from the extract.
pub async fn upsert_claim(
    conn: &mut SqliteConnection,
    employee_id: Uuid,
    absence_case_number: &str,
) -> Result<Claim> {
    if let Some(existing) = get_claim_by_absence_case_number(conn, absence_case_number).await? {
        return Ok(existing);
    }
    let claim = Claim {
        claim_id: Uuid::new_v4(),
        employee_id,
        absence_case_number: absence_case_number.to_string(),
    };
    let sql = Query::insert()
        .into_table(Claims::Table)
        .columns([Claims::ClaimId, Claims::EmployeeId, Claims::AbsenceCaseNumber])
        .values_panic([
            claim.claim_id.to_string().into(),
            employee_id.to_string().into(),
            absence_case_number.into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(claim)
}

fn decode_absence_period(row: &SqliteRow) -> Result<AbsencePeriod> {
    Ok(AbsencePeriod {
        absence_period_id: get_uuid(row, "absence_period_id")?,
        claim_id: get_uuid(row, "claim_id")?,
        key: AbsencePeriodKey {
            class_id: row.try_get("class_id")?,
            index_id: row.try_get("index_id")?,
        },
        start_date: get_date(row, "start_date")?,
        end_date: get_date(row, "end_date")?,
    })
}

pub async fn get_absence_periods(
    conn: &mut SqliteConnection,
    claim_id: Uuid,
) -> Result<Vec<AbsencePeriod>> {
    let sql = Query::select()
        .columns([
            AbsencePeriods::AbsencePeriodId,
            AbsencePeriods::ClaimId,
            AbsencePeriods::ClassId,
            AbsencePeriods::IndexId,
            AbsencePeriods::StartDate,
            AbsencePeriods::EndDate,
        ])
        .from(AbsencePeriods::Table)
        .and_where(Expr::col(AbsencePeriods::ClaimId).eq(claim_id.to_string()))
        .order_by(AbsencePeriods::StartDate, Order::Asc)
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(decode_absence_period).collect()
}

/// Insert or update an absence period matched by its composite
/// (claim, class id, index id) key - never by a source-provided id.
pub async fn upsert_absence_period(
    conn: &mut SqliteConnection,
    claim_id: Uuid,
    key: AbsencePeriodKey,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<AbsencePeriod> {
    let existing_sql = Query::select()
        .columns([
            AbsencePeriods::AbsencePeriodId,
            AbsencePeriods::ClaimId,
            AbsencePeriods::ClassId,
            AbsencePeriods::IndexId,
            AbsencePeriods::StartDate,
            AbsencePeriods::EndDate,
        ])
        .from(AbsencePeriods::Table)
        .and_where(Expr::col(AbsencePeriods::ClaimId).eq(claim_id.to_string()))
        .and_where(Expr::col(AbsencePeriods::ClassId).eq(key.class_id))
        .and_where(Expr::col(AbsencePeriods::IndexId).eq(key.index_id))
        .to_string(SqliteQueryBuilder);
    let existing = sqlx::query(&existing_sql).fetch_optional(&mut *conn).await?;

    if let Some(row) = existing {
        let period = decode_absence_period(&row)?;
        let sql = Query::update()
            .table(AbsencePeriods::Table)
            .value(AbsencePeriods::StartDate, format_date(start_date))
            .value(AbsencePeriods::EndDate, format_date(end_date))
            .and_where(
                Expr::col(AbsencePeriods::AbsencePeriodId)
                    .eq(period.absence_period_id.to_string()),
            )
            .to_string(SqliteQueryBuilder);
        sqlx::query(&sql).execute(&mut *conn).await?;
        return Ok(AbsencePeriod {
            start_date,
            end_date,
            ..period
        });
    }

    let period = AbsencePeriod {
        absence_period_id: Uuid::new_v4(),
        claim_id,
        key,
        start_date,
        end_date,
    };
    let sql = Query::insert()
        .into_table(AbsencePeriods::Table)
        .columns([
            AbsencePeriods::AbsencePeriodId,
            AbsencePeriods::ClaimId,
            AbsencePeriods::ClassId,
            AbsencePeriods::IndexId,
            AbsencePeriods::StartDate,
            AbsencePeriods::EndDate,
        ])
        .values_panic([
            period.absence_period_id.to_string().into(),
            claim_id.to_string().into(),
            key.class_id.into(),
            key.index_id.into(),
            format_date(start_date).into(),
            format_date(end_date).into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(period)
}

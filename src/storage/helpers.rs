//! Row decoding helpers shared by the store modules.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{Result, StorageError};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn get_uuid(row: &SqliteRow, column: &'static str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    Uuid::parse_str(&value).map_err(|_| StorageError::InvalidUuid { column, value })
}

pub fn get_opt_uuid(row: &SqliteRow, column: &'static str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    match value {
        Some(value) => Uuid::parse_str(&value)
            .map(Some)
            .map_err(|_| StorageError::InvalidUuid { column, value }),
        None => Ok(None),
    }
}

pub fn get_datetime(row: &SqliteRow, column: &'static str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    parse_datetime(column, &value)
}

pub fn get_opt_datetime(row: &SqliteRow, column: &'static str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.try_get(column)?;
    value.map(|v| parse_datetime(column, &v)).transpose()
}

fn parse_datetime(column: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp {
            column,
            value: value.to_string(),
        })
}

pub fn get_date(row: &SqliteRow, column: &'static str) -> Result<NaiveDate> {
    let value: String = row.try_get(column)?;
    parse_date(column, &value)
}

pub fn parse_date(column: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| StorageError::InvalidDate {
        column,
        value: value.to_string(),
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn get_decimal(row: &SqliteRow, column: &'static str) -> Result<Decimal> {
    let value: String = row.try_get(column)?;
    value
        .parse::<Decimal>()
        .map_err(|_| StorageError::InvalidDecimal { column, value })
}

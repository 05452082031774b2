//! Reference files and the payment link table.
//!
//! Every file the pipeline produces or consumes has exactly one reference
//! file row; the link table records which payments each file covers so
//! "what got written where" stays auditable without re-parsing files.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::{ReferenceFile, ReferenceFileType};

use super::helpers::{get_datetime, get_uuid, now_rfc3339};
use super::schema::{PaymentReferenceFiles, ReferenceFiles};
use super::{Result, StorageError};

fn decode_reference_file(row: &SqliteRow) -> Result<ReferenceFile> {
    let type_str: String = row.try_get("reference_file_type")?;
    let reference_file_type =
        ReferenceFileType::from_str(&type_str).ok_or(StorageError::UnknownEnumValue {
            kind: "reference file type",
            value: type_str,
        })?;
    Ok(ReferenceFile {
        reference_file_id: get_uuid(row, "reference_file_id")?,
        file_location: row.try_get("file_location")?,
        reference_file_type,
        created_at: get_datetime(row, "created_at")?,
    })
}

pub async fn create_reference_file(
    conn: &mut SqliteConnection,
    file_location: &str,
    reference_file_type: ReferenceFileType,
) -> Result<ReferenceFile> {
    let reference_file = ReferenceFile {
        reference_file_id: Uuid::new_v4(),
        file_location: file_location.to_string(),
        reference_file_type,
        created_at: chrono::Utc::now(),
    };
    let sql = Query::insert()
        .into_table(ReferenceFiles::Table)
        .columns([
            ReferenceFiles::ReferenceFileId,
            ReferenceFiles::FileLocation,
            ReferenceFiles::ReferenceFileType,
            ReferenceFiles::CreatedAt,
        ])
        .values_panic([
            reference_file.reference_file_id.to_string().into(),
            file_location.into(),
            reference_file_type.as_str().into(),
            now_rfc3339().into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(reference_file)
}

pub async fn get_reference_file(
    conn: &mut SqliteConnection,
    reference_file_id: Uuid,
) -> Result<Option<ReferenceFile>> {
    let sql = Query::select()
        .columns([
            ReferenceFiles::ReferenceFileId,
            ReferenceFiles::FileLocation,
            ReferenceFiles::ReferenceFileType,
            ReferenceFiles::CreatedAt,
        ])
        .from(ReferenceFiles::Table)
        .and_where(Expr::col(ReferenceFiles::ReferenceFileId).eq(reference_file_id.to_string()))
        .to_string(SqliteQueryBuilder);
    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(decode_reference_file).transpose()
}

/// Reference files of a type whose location is still under a directory
/// prefix. "Pending" extracts are the ones still under the received dir.
pub async fn list_reference_files_under(
    conn: &mut SqliteConnection,
    reference_file_type: ReferenceFileType,
    location_prefix: &str,
) -> Result<Vec<ReferenceFile>> {
    let pattern = format!("{}%", location_prefix.replace('%', ""));
    let sql = Query::select()
        .columns([
            ReferenceFiles::ReferenceFileId,
            ReferenceFiles::FileLocation,
            ReferenceFiles::ReferenceFileType,
            ReferenceFiles::CreatedAt,
        ])
        .from(ReferenceFiles::Table)
        .and_where(Expr::col(ReferenceFiles::ReferenceFileType).eq(reference_file_type.as_str()))
        .and_where(Expr::col(ReferenceFiles::FileLocation).like(pattern))
        .order_by(ReferenceFiles::CreatedAt, Order::Asc)
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(decode_reference_file).collect()
}

/// Update a reference file's location. Callers must pair this with the
/// actual file move - never one without the other.
pub async fn update_location(
    conn: &mut SqliteConnection,
    reference_file_id: Uuid,
    new_location: &str,
) -> Result<()> {
    let sql = Query::update()
        .table(ReferenceFiles::Table)
        .value(ReferenceFiles::FileLocation, new_location)
        .and_where(Expr::col(ReferenceFiles::ReferenceFileId).eq(reference_file_id.to_string()))
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// Link a payment to a file that covers it.
pub async fn link_payment(
    conn: &mut SqliteConnection,
    payment_id: Uuid,
    reference_file_id: Uuid,
) -> Result<()> {
    let sql = Query::insert()
        .into_table(PaymentReferenceFiles::Table)
        .columns([
            PaymentReferenceFiles::PaymentId,
            PaymentReferenceFiles::ReferenceFileId,
        ])
        .values_panic([
            payment_id.to_string().into(),
            reference_file_id.to_string().into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// Payment ids covered by a file.
pub async fn linked_payments(
    conn: &mut SqliteConnection,
    reference_file_id: Uuid,
) -> Result<Vec<Uuid>> {
    let sql = Query::select()
        .column(PaymentReferenceFiles::PaymentId)
        .from(PaymentReferenceFiles::Table)
        .and_where(
            Expr::col(PaymentReferenceFiles::ReferenceFileId).eq(reference_file_id.to_string()),
        )
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(|row| get_uuid(row, "payment_id")).collect()
}

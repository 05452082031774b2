//! Import log store: one row per step execution.
//!
//! Runs on the dedicated log database so an error-marked row survives a
//! rollback of the working session.

use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection};

use crate::model::{ImportLog, ImportStatus};

use super::helpers::{get_datetime, get_opt_datetime, now_rfc3339};
use super::schema::ImportLogs;
use super::{Result, StorageError};

/// Create an in-progress import log for a starting step.
pub async fn create_import_log(conn: &mut SqliteConnection, source: &str) -> Result<ImportLog> {
    let start = now_rfc3339();
    let sql = Query::insert()
        .into_table(ImportLogs::Table)
        .columns([ImportLogs::Source, ImportLogs::Status, ImportLogs::StartAt])
        .values_panic([
            source.into(),
            ImportStatus::InProgress.as_str().into(),
            start.into(),
        ])
        .to_string(SqliteQueryBuilder);

    let import_log_id = sqlx::query(&sql).execute(&mut *conn).await?.last_insert_rowid();

    Ok(ImportLog {
        import_log_id,
        source: source.to_string(),
        status: ImportStatus::InProgress,
        report: None,
        start: chrono::Utc::now(),
        end: None,
    })
}

/// Finalize an import log with its status, end timestamp and report blob.
pub async fn finalize_import_log(
    conn: &mut SqliteConnection,
    import_log_id: i64,
    status: ImportStatus,
    report: &serde_json::Value,
) -> Result<()> {
    let sql = Query::update()
        .table(ImportLogs::Table)
        .value(ImportLogs::Status, status.as_str())
        .value(ImportLogs::Report, serde_json::to_string(report)?)
        .value(ImportLogs::EndAt, now_rfc3339())
        .and_where(Expr::col(ImportLogs::ImportLogId).eq(import_log_id))
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// Fetch an import log row.
pub async fn get_import_log(
    conn: &mut SqliteConnection,
    import_log_id: i64,
) -> Result<Option<ImportLog>> {
    let sql = Query::select()
        .columns([
            ImportLogs::ImportLogId,
            ImportLogs::Source,
            ImportLogs::Status,
            ImportLogs::Report,
            ImportLogs::StartAt,
            ImportLogs::EndAt,
        ])
        .from(ImportLogs::Table)
        .and_where(Expr::col(ImportLogs::ImportLogId).eq(import_log_id))
        .to_string(SqliteQueryBuilder);

    let row = match sqlx::query(&sql).fetch_optional(&mut *conn).await? {
        Some(row) => row,
        None => return Ok(None),
    };

    let status_str: String = row.try_get("status")?;
    let status =
        ImportStatus::from_str(&status_str).ok_or_else(|| StorageError::UnknownEnumValue {
            kind: "import status",
            value: status_str,
        })?;
    let report: Option<String> = row.try_get("report")?;
    let report = report
        .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
        .transpose()?;

    Ok(Some(ImportLog {
        import_log_id: row.try_get("import_log_id")?,
        source: row.try_get("source")?,
        status,
        report,
        start: get_datetime(&row, "start_at")?,
        end: get_opt_datetime(&row, "end_at")?,
    }))
}

//! Audit report details, writeback details and the report-inclusion queue.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::{PaymentAuditReportType, WritebackTransactionStatus};

use super::helpers::{get_opt_datetime, get_uuid, now_rfc3339};
use super::schema::{AuditReportDetails, ReportQueue, WritebackDetails};
use super::{Result, StorageError};

/// One audit rejection staged for the audit report.
#[derive(Debug, Clone)]
pub struct AuditReportDetail {
    pub audit_report_detail_id: i64,
    pub payment_id: Uuid,
    pub audit_report_type: PaymentAuditReportType,
    pub details: String,
    pub import_log_id: Option<i64>,
    pub added_to_audit_report_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn decode_audit_detail(row: &SqliteRow) -> Result<AuditReportDetail> {
    let type_str: String = row.try_get("audit_report_type")?;
    let audit_report_type =
        PaymentAuditReportType::from_str(&type_str).ok_or(StorageError::UnknownEnumValue {
            kind: "audit report type",
            value: type_str,
        })?;
    Ok(AuditReportDetail {
        audit_report_detail_id: row.try_get("audit_report_detail_id")?,
        payment_id: get_uuid(row, "payment_id")?,
        audit_report_type,
        details: row.try_get("details")?,
        import_log_id: row.try_get("import_log_id")?,
        added_to_audit_report_at: get_opt_datetime(row, "added_to_audit_report_at")?,
    })
}

/// Stage an audit-report detail row for a rejected payment.
pub async fn stage_audit_report_detail(
    conn: &mut SqliteConnection,
    payment_id: Uuid,
    audit_report_type: PaymentAuditReportType,
    details: &str,
    import_log_id: Option<i64>,
) -> Result<()> {
    let sql = Query::insert()
        .into_table(AuditReportDetails::Table)
        .columns([
            AuditReportDetails::PaymentId,
            AuditReportDetails::AuditReportType,
            AuditReportDetails::Details,
            AuditReportDetails::ImportLogId,
            AuditReportDetails::CreatedAt,
        ])
        .values_panic([
            payment_id.to_string().into(),
            audit_report_type.as_str().into(),
            details.into(),
            import_log_id.into(),
            now_rfc3339().into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// Details not yet included on an audit report, oldest first.
pub async fn list_unsent_audit_details(
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditReportDetail>> {
    let sql = Query::select()
        .columns([
            AuditReportDetails::AuditReportDetailId,
            AuditReportDetails::PaymentId,
            AuditReportDetails::AuditReportType,
            AuditReportDetails::Details,
            AuditReportDetails::ImportLogId,
            AuditReportDetails::AddedToAuditReportAt,
        ])
        .from(AuditReportDetails::Table)
        .and_where(Expr::col(AuditReportDetails::AddedToAuditReportAt).is_null())
        .order_by(AuditReportDetails::AuditReportDetailId, Order::Asc)
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(decode_audit_detail).collect()
}

pub async fn mark_audit_details_sent(
    conn: &mut SqliteConnection,
    detail_ids: &[i64],
) -> Result<()> {
    if detail_ids.is_empty() {
        return Ok(());
    }
    let sql = Query::update()
        .table(AuditReportDetails::Table)
        .value(AuditReportDetails::AddedToAuditReportAt, now_rfc3339())
        .and_where(
            Expr::col(AuditReportDetails::AuditReportDetailId).is_in(detail_ids.iter().copied()),
        )
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// One transaction status waiting to be written back.
#[derive(Debug, Clone)]
pub struct WritebackDetail {
    pub writeback_detail_id: i64,
    pub payment_id: Uuid,
    pub transaction_status: WritebackTransactionStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn create_writeback_detail(
    conn: &mut SqliteConnection,
    payment_id: Uuid,
    transaction_status: WritebackTransactionStatus,
) -> Result<()> {
    let sql = Query::insert()
        .into_table(WritebackDetails::Table)
        .columns([
            WritebackDetails::PaymentId,
            WritebackDetails::TransactionStatus,
            WritebackDetails::CreatedAt,
        ])
        .values_panic([
            payment_id.to_string().into(),
            transaction_status.as_str().into(),
            now_rfc3339().into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// Writeback details not yet sent, oldest first.
pub async fn list_pending_writeback_details(
    conn: &mut SqliteConnection,
) -> Result<Vec<WritebackDetail>> {
    let sql = Query::select()
        .columns([
            WritebackDetails::WritebackDetailId,
            WritebackDetails::PaymentId,
            WritebackDetails::TransactionStatus,
            WritebackDetails::CreatedAt,
        ])
        .from(WritebackDetails::Table)
        .and_where(Expr::col(WritebackDetails::WritebackSentAt).is_null())
        .order_by(WritebackDetails::WritebackDetailId, Order::Asc)
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| {
            let status_str: String = row.try_get("transaction_status")?;
            let transaction_status = WritebackTransactionStatus::from_str(&status_str).ok_or(
                StorageError::UnknownEnumValue {
                    kind: "writeback transaction status",
                    value: status_str,
                },
            )?;
            Ok(WritebackDetail {
                writeback_detail_id: row.try_get("writeback_detail_id")?,
                payment_id: get_uuid(row, "payment_id")?,
                transaction_status,
                created_at: super::helpers::get_datetime(row, "created_at")?,
            })
        })
        .collect()
}

pub async fn mark_writeback_details_sent(
    conn: &mut SqliteConnection,
    detail_ids: &[i64],
) -> Result<()> {
    if detail_ids.is_empty() {
        return Ok(());
    }
    let sql = Query::update()
        .table(WritebackDetails::Table)
        .value(WritebackDetails::WritebackSentAt, now_rfc3339())
        .and_where(
            Expr::col(WritebackDetails::WritebackDetailId).is_in(detail_ids.iter().copied()),
        )
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// Queue a payment for inclusion on a named report source.
pub async fn add_to_report_queue(
    conn: &mut SqliteConnection,
    payment_id: Option<Uuid>,
    source: &str,
) -> Result<()> {
    let sql = Query::insert()
        .into_table(ReportQueue::Table)
        .columns([
            ReportQueue::PaymentId,
            ReportQueue::Source,
            ReportQueue::CreatedAt,
        ])
        .values_panic([
            payment_id.map(|id| id.to_string()).into(),
            source.into(),
            now_rfc3339().into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// All queued (row id, source) pairs, oldest first.
pub async fn queued_sources(conn: &mut SqliteConnection) -> Result<Vec<(i64, String)>> {
    let sql = Query::select()
        .columns([ReportQueue::ReportQueueId, ReportQueue::Source])
        .from(ReportQueue::Table)
        .order_by(ReportQueue::ReportQueueId, Order::Asc)
        .to_string(SqliteQueryBuilder);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| Ok((row.try_get("report_queue_id")?, row.try_get("source")?)))
        .collect()
}

/// Remove every queue row belonging to the named sources. Rows for other
/// sources are untouched.
pub async fn clear_sources(conn: &mut SqliteConnection, sources: &[String]) -> Result<()> {
    if sources.is_empty() {
        return Ok(());
    }
    let sql = Query::delete()
        .from_table(ReportQueue::Table)
        .and_where(Expr::col(ReportQueue::Source).is_in(sources.iter().cloned()))
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

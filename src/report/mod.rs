//! SQL-defined operational reports.
//!
//! Each report is a named SQL query shipped with the binary; rows export
//! to CSV with every column cast to text by the query itself. Report
//! queue sources are cleared only after every report in the run
//! succeeded, so a failing report leaves the whole queue for the next
//! run.

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Column, Row};

use crate::config::PipelineConfig;
use crate::model::ReferenceFileType;
use crate::outbound::csv_field;
use crate::pipeline::{files, Result, Step, StepContext};
use crate::storage::{audit_store, reference_file_store};

/// Report queue source fed by the payment extract's error path.
pub const SOURCE_PAYMENT_ERROR_REPORT: &str = "payment-error-report";
/// Report queue source fed by the claimant extract's error path.
pub const SOURCE_CLAIMANT_ERROR_REPORT: &str = "claimant-error-report";
/// Report queue source fed by post-processing audit findings.
pub const SOURCE_AUDIT_REPORT: &str = "payment-audit-report";

/// The reports shipped with the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportName {
    PaymentErrorReport,
    ClaimantErrorReport,
    PaymentAuditReport,
    StateSummary,
}

impl ReportName {
    pub const ALL: [ReportName; 4] = [
        ReportName::PaymentErrorReport,
        ReportName::ClaimantErrorReport,
        ReportName::PaymentAuditReport,
        ReportName::StateSummary,
    ];

    pub fn file_stem(&self) -> &'static str {
        match self {
            ReportName::PaymentErrorReport => "payment-error-report",
            ReportName::ClaimantErrorReport => "claimant-error-report",
            ReportName::PaymentAuditReport => "payment-audit-report",
            ReportName::StateSummary => "state-summary",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            ReportName::PaymentErrorReport => include_str!("sql/payment_error_report.sql"),
            ReportName::ClaimantErrorReport => include_str!("sql/claimant_error_report.sql"),
            ReportName::PaymentAuditReport => include_str!("sql/payment_audit_report.sql"),
            ReportName::StateSummary => include_str!("sql/state_summary.sql"),
        }
    }

    fn source_to_clear(&self) -> Option<&'static str> {
        match self {
            ReportName::PaymentErrorReport => Some(SOURCE_PAYMENT_ERROR_REPORT),
            ReportName::ClaimantErrorReport => Some(SOURCE_CLAIMANT_ERROR_REPORT),
            ReportName::PaymentAuditReport => Some(SOURCE_AUDIT_REPORT),
            ReportName::StateSummary => None,
        }
    }

    fn definition(&self) -> ReportDefinition {
        ReportDefinition {
            name: self.file_stem().to_string(),
            sql: self.sql().to_string(),
            source_to_clear: self.source_to_clear().map(str::to_string),
            marks_audit_details_sent: *self == ReportName::PaymentAuditReport,
        }
    }
}

/// One report to run: a name, its SQL and its queue bookkeeping.
#[derive(Debug, Clone)]
pub struct ReportDefinition {
    pub name: String,
    pub sql: String,
    pub source_to_clear: Option<String>,
    pub marks_audit_details_sent: bool,
}

pub struct ReportStep {
    config: PipelineConfig,
    definitions: Vec<ReportDefinition>,
}

impl ReportStep {
    pub fn new(config: PipelineConfig) -> ReportStep {
        ReportStep {
            config,
            definitions: ReportName::ALL.iter().map(ReportName::definition).collect(),
        }
    }

    #[cfg(test)]
    pub fn with_definitions(config: PipelineConfig, definitions: Vec<ReportDefinition>) -> ReportStep {
        ReportStep {
            config,
            definitions,
        }
    }
}

/// Render a result set as CSV. Header comes from the query's column
/// names; `None` values export as empty fields.
fn rows_to_csv(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Option<String>> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let mut csv = first
        .columns()
        .iter()
        .map(|column| csv_field(column.name()))
        .collect::<Vec<_>>()
        .join(",");
    csv.push('\n');
    for row in rows {
        let mut fields = Vec::with_capacity(row.columns().len());
        for index in 0..row.columns().len() {
            let value: Option<String> = row.try_get(index)?;
            fields.push(csv_field(value.as_deref().unwrap_or("")));
        }
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }
    Ok(Some(csv))
}

#[async_trait]
impl Step for ReportStep {
    fn name(&self) -> &'static str {
        "generate-reports"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let mut cleared_sources = Vec::new();
        let mut mark_audit_sent = false;

        for definition in &self.definitions {
            let rows = sqlx::query(&definition.sql).fetch_all(&mut *ctx.conn).await?;
            ctx.log
                .increment_by(&format!("report_rows_{}", definition.name), rows.len() as i64);

            if let Some(csv) = rows_to_csv(&rows)? {
                let path = self
                    .config
                    .outbound_dir
                    .join("reports")
                    .join(format!("{}-{stamp}.csv", definition.name));
                files::write_outbound_file(&path, &csv).await?;
                reference_file_store::create_reference_file(
                    ctx.conn,
                    &path.to_string_lossy(),
                    ReferenceFileType::Report,
                )
                .await?;
            }

            if let Some(source) = &definition.source_to_clear {
                cleared_sources.push(source.clone());
            }
            if definition.marks_audit_details_sent && !rows.is_empty() {
                mark_audit_sent = true;
            }
        }

        // Queue bookkeeping happens only after every report succeeded; a
        // failure above leaves all sources queued for the next run.
        audit_store::clear_sources(ctx.conn, &cleared_sources).await?;
        if mark_audit_sent {
            let unsent = audit_store::list_unsent_audit_details(ctx.conn).await?;
            let ids: Vec<i64> = unsent.iter().map(|d| d.audit_report_detail_id).collect();
            audit_store::mark_audit_details_sent(ctx.conn, &ids).await?;
            ctx.log.increment_by("audit_details_reported", ids.len() as i64);
        }
        Ok(())
    }
}

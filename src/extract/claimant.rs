//! Claimant extract processing.

use async_trait::async_trait;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::model::{Outcome, PaymentMethod, ReferenceFileType, State, StateLogEntity};
use crate::pipeline::{files, Result, Step, StepContext};
use crate::storage::{audit_store, claim_store, employee_store, extract_store, state_log_store};
use crate::validation::{ValidationContainer, ValidationReason};

use super::{parse_date_field, pending_extract_files};

/// Consumes one claimant extract file per invocation, upserting
/// employees, claims and absence periods. Records failing validation go
/// to the claimant error-report state with their issues attached.
pub struct ClaimantExtractStep {
    config: PipelineConfig,
    more_files: bool,
}

impl ClaimantExtractStep {
    pub fn new(config: PipelineConfig) -> ClaimantExtractStep {
        ClaimantExtractStep {
            config,
            more_files: false,
        }
    }

    async fn process_row(
        &self,
        ctx: &mut StepContext<'_>,
        row: &crate::model::StagedClaimantRow,
    ) -> Result<()> {
        let record_key = row
            .absence_case_number
            .clone()
            .unwrap_or_else(|| "<unknown case>".to_string());
        let mut container = ValidationContainer::new(record_key);

        let Some(tax_identifier) = container.require("TAXID", row.tax_identifier.as_deref())
        else {
            // Without a tax identifier there is no employee to key the
            // error state to; the row is counted and logged instead.
            warn!(
                case = %container.record_key(),
                "claimant row has no tax identifier, skipping"
            );
            ctx.increment("claimant_rows_missing_tax_identifier");
            return Ok(());
        };

        let first_name = container
            .require("FIRSTNAMES", row.first_name.as_deref())
            .unwrap_or("");
        let last_name = container
            .require("LASTNAME", row.last_name.as_deref())
            .unwrap_or("");

        // ACH claimants must arrive with complete EFT details.
        if row.payment_method.as_deref() == Some(PaymentMethod::Ach.as_str()) {
            if row.routing_number.as_deref().map_or(true, str::is_empty) {
                container.add_validation_issue(
                    ValidationReason::MissingEftInformation,
                    "SORTCODE",
                );
            }
            if row.account_number.as_deref().map_or(true, str::is_empty) {
                container.add_validation_issue(
                    ValidationReason::MissingEftInformation,
                    "ACCOUNTNO",
                );
            }
        }

        let case_number = container.require("ABSENCE_CASENUMBER", row.absence_case_number.as_deref());
        let period_key = match row.absence_period_index.as_deref() {
            Some(raw) => match raw.parse::<crate::model::AbsencePeriodKey>() {
                Ok(key) => Some(key),
                Err(_) => {
                    container.add_validation_issue(
                        ValidationReason::ValueConversionError,
                        format!("ABSENCEPERIOD_INDEXID: {raw}"),
                    );
                    None
                }
            },
            None => {
                container.add_validation_issue(
                    ValidationReason::MissingField,
                    "ABSENCEPERIOD_INDEXID",
                );
                None
            }
        };
        let period_start = parse_date_field(
            &mut container,
            "ABSENCEPERIOD_START",
            row.absence_period_start.as_deref(),
        );
        let period_end = parse_date_field(
            &mut container,
            "ABSENCEPERIOD_END",
            row.absence_period_end.as_deref(),
        );

        let employee = employee_store::upsert_employee(
            ctx.conn,
            tax_identifier,
            first_name,
            last_name,
            row.routing_number.as_deref(),
            row.account_number.as_deref(),
        )
        .await?;
        let entity = StateLogEntity::Employee(employee.employee_id);
        let import_log_id = ctx.import_log_id();

        if container.has_validation_issues() {
            let outcome = Outcome::with_issues(
                format!("{}: claimant failed extract validation", container.record_key()),
                container.into_issues(),
            );
            state_log_store::create_state_log(
                ctx.conn,
                State::ClaimantAddToClaimantErrorReport,
                Some(outcome),
                entity,
                import_log_id,
            )
            .await?;
            audit_store::add_to_report_queue(
                ctx.conn,
                None,
                crate::report::SOURCE_CLAIMANT_ERROR_REPORT,
            )
            .await?;
            ctx.increment("claimant_rows_errored");
            return Ok(());
        }

        // Validation guarantees these are present.
        if let (Some(case_number), Some(key), Some(start), Some(end)) =
            (case_number, period_key, period_start, period_end)
        {
            let claim = claim_store::upsert_claim(ctx.conn, employee.employee_id, case_number).await?;
            claim_store::upsert_absence_period(ctx.conn, claim.claim_id, key, start, end).await?;
            state_log_store::create_state_log(
                ctx.conn,
                State::ClaimantExtracted,
                Some(Outcome::message("claimant extracted")),
                entity,
                import_log_id,
            )
            .await?;
            ctx.increment("claimant_rows_extracted");
            Ok(())
        } else {
            Err(crate::pipeline::StepError::invariant(
                "claimant row produced no value and no validation issue",
            ))
        }
    }
}

#[async_trait]
impl Step for ClaimantExtractStep {
    fn name(&self) -> &'static str {
        "claimant-extract"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let pending = pending_extract_files(
            ctx.conn,
            ReferenceFileType::ClaimantExtract,
            &self.config.received_dir,
        )
        .await?;
        let Some(file) = pending.first() else {
            self.more_files = false;
            return Ok(());
        };
        ctx.set_metric("file", file.file_location.clone().into());

        let rows =
            extract_store::fetch_staged_claimant_rows(ctx.conn, file.reference_file_id).await?;
        for row in &rows {
            ctx.increment("claimant_rows_processed");
            self.process_row(ctx, row).await?;
        }

        files::move_reference_file(ctx.conn, file, &self.config.processed_dir).await?;
        self.more_files = pending.len() > 1;
        Ok(())
    }

    fn have_more_files_to_process(&self) -> bool {
        self.more_files
    }
}

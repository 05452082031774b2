//! Payment extract processing.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::model::{
    Claim, Outcome, Payment, PaymentMethod, ReferenceFileType, StagedPaymentRow, State,
    StateLogEntity,
};
use crate::pipeline::{files, Result, Step, StepContext};
use crate::report::SOURCE_PAYMENT_ERROR_REPORT;
use crate::storage::{
    audit_store, claim_store, employee_store, extract_store, payment_store, reference_file_store,
    state_log_store,
};
use crate::validation::{ValidationContainer, ValidationReason};

use super::{parse_date_field, pending_extract_files};

/// Consumes one payment extract file per invocation.
///
/// Extract rows are vendor-line grained; they group by the payment's
/// C/I identifier pair into one payment whose amount is the line sum and
/// whose period spans the lines. Valid payments go straight to the
/// validated state; everything else carries its issues into the error
/// path, still as a payment row when one can be keyed.
pub struct PaymentExtractStep {
    config: PipelineConfig,
    more_files: bool,
}

impl PaymentExtractStep {
    pub fn new(config: PipelineConfig) -> PaymentExtractStep {
        PaymentExtractStep {
            config,
            more_files: false,
        }
    }

    async fn process_group(
        &self,
        ctx: &mut StepContext<'_>,
        pei_c_value: Option<String>,
        pei_i_value: Option<String>,
        rows: &[StagedPaymentRow],
        reference_file_id: Uuid,
    ) -> Result<()> {
        let record_key = format!(
            "{} / {}",
            pei_c_value.as_deref().unwrap_or("<missing C>"),
            pei_i_value.as_deref().unwrap_or("<missing I>"),
        );
        let mut container = ValidationContainer::new(record_key);

        let pei_c = container.require("PECLASSID", pei_c_value.as_deref());
        let pei_i = container.require("PEINDEXID", pei_i_value.as_deref());
        let (Some(pei_c), Some(pei_i)) = (pei_c, pei_i) else {
            // No identifier pair means no payment row to key a state to.
            warn!(rows = rows.len(), "payment extract rows have no C/I pair, skipping");
            ctx.log.increment_by("payment_rows_missing_pei_key", rows.len() as i64);
            return Ok(());
        };

        // Shared fields come from the first line of the group.
        let first = &rows[0];

        let claim = self.lookup_claim(ctx, &mut container, first).await?;

        let mut amount = Decimal::ZERO;
        let mut period_start = None;
        let mut period_end = None;
        for row in rows {
            match row
                .amount
                .as_deref()
                .and_then(|raw| raw.parse::<Decimal>().ok())
            {
                Some(line_amount) => amount += line_amount,
                None => container.add_validation_issue(
                    ValidationReason::ValueConversionError,
                    format!("AMOUNT_MONAMT: {:?}", row.amount),
                ),
            }
            let start = parse_date_field(&mut container, "PAYMENTSTARTP", row.period_start.as_deref());
            let end = parse_date_field(&mut container, "PAYMENTENDPER", row.period_end.as_deref());
            period_start = match (period_start, start) {
                (Some(a), Some(b)) => Some(std::cmp::min(a, b)),
                (a, b) => a.or(b),
            };
            period_end = match (period_end, end) {
                (Some(a), Some(b)) => Some(std::cmp::max(a, b)),
                (a, b) => a.or(b),
            };
        }

        let payment_method = match container.require("PAYMENTMETHOD", first.payment_method.as_deref())
        {
            Some(raw) => match PaymentMethod::from_extract_str(raw) {
                Some(method) => {
                    if method == PaymentMethod::Debit {
                        container.add_validation_issue(
                            ValidationReason::InvalidValue,
                            "PAYMENTMETHOD: Debit is not supported for disbursement",
                        );
                    }
                    Some(method)
                }
                None => {
                    container.add_validation_issue(
                        ValidationReason::InvalidValue,
                        format!("PAYMENTMETHOD: {raw}"),
                    );
                    None
                }
            },
            None => None,
        };

        // EFT destination lives on the employee, ingested from the
        // claimant extract.
        let (routing_number, account_number) = match (payment_method, &claim) {
            (Some(PaymentMethod::Ach), Some(claim)) => {
                let employee = employee_store::get_employee(ctx.conn, claim.employee_id).await?;
                let (routing, account) = employee
                    .map(|e| (e.routing_number, e.account_number))
                    .unwrap_or((None, None));
                if routing.is_none() {
                    container
                        .add_validation_issue(ValidationReason::MissingEftInformation, "SORTCODE");
                }
                if account.is_none() {
                    container
                        .add_validation_issue(ValidationReason::MissingEftInformation, "ACCOUNTNO");
                }
                (routing, account)
            }
            _ => (None, None),
        };

        let (Some(period_start), Some(period_end), Some(payment_method)) =
            (period_start, period_end, payment_method)
        else {
            // Structurally unusable: there is nothing well-formed enough
            // to store as a payment row. Counted, logged, batch continues.
            warn!(
                key = container.record_key(),
                issues = container.issues().len(),
                "payment group unprocessable, skipping"
            );
            ctx.increment("payment_groups_unprocessable");
            return Ok(());
        };

        let payment = Payment {
            payment_id: Uuid::new_v4(),
            claim_id: claim.as_ref().map(|c| c.claim_id),
            pei_c_value: pei_c.to_string(),
            pei_i_value: pei_i.to_string(),
            period_start_date: period_start,
            period_end_date: period_end,
            amount,
            payment_method,
            is_adhoc_payment: first.is_adhoc.as_deref() == Some("Y"),
            payee_name: first.payee_name.clone(),
            routing_number,
            account_number,
            check_number: None,
            import_log_id: ctx.import_log_id(),
        };
        payment_store::insert_payment(ctx.conn, &payment).await?;
        reference_file_store::link_payment(ctx.conn, payment.payment_id, reference_file_id).await?;
        let entity = StateLogEntity::Payment(payment.payment_id);
        let import_log_id = ctx.import_log_id();

        if container.has_validation_issues() {
            let outcome = Outcome::with_issues(
                format!("{}: payment failed extract validation", container.record_key()),
                container.into_issues(),
            );
            state_log_store::create_state_log(
                ctx.conn,
                State::PaymentAddToErrorReport,
                Some(outcome),
                entity,
                import_log_id,
            )
            .await?;
            audit_store::add_to_report_queue(
                ctx.conn,
                Some(payment.payment_id),
                SOURCE_PAYMENT_ERROR_REPORT,
            )
            .await?;
            ctx.increment("payments_errored");
        } else {
            state_log_store::create_state_log(
                ctx.conn,
                State::PaymentValidated,
                Some(Outcome::message("payment validated")),
                entity,
                import_log_id,
            )
            .await?;
            ctx.increment("payments_validated");
        }
        Ok(())
    }

    async fn lookup_claim(
        &self,
        ctx: &mut StepContext<'_>,
        container: &mut ValidationContainer,
        first: &StagedPaymentRow,
    ) -> Result<Option<Claim>> {
        let Some(case_number) =
            container.require("ABSENCE_CASENUMBER", first.absence_case_number.as_deref())
        else {
            return Ok(None);
        };
        let claim = claim_store::get_claim_by_absence_case_number(ctx.conn, case_number).await?;
        if claim.is_none() {
            container.add_validation_issue(ValidationReason::ClaimNotFound, case_number);
        }
        Ok(claim)
    }
}

#[async_trait]
impl Step for PaymentExtractStep {
    fn name(&self) -> &'static str {
        "payment-extract"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let pending = pending_extract_files(
            ctx.conn,
            ReferenceFileType::PaymentExtract,
            &self.config.received_dir,
        )
        .await?;
        let Some(file) = pending.first() else {
            self.more_files = false;
            return Ok(());
        };
        ctx.set_metric("file", file.file_location.clone().into());

        let rows = extract_store::fetch_staged_payment_rows(ctx.conn, file.reference_file_id).await?;
        ctx.log.increment_by("payment_rows_processed", rows.len() as i64);

        // Group by C/I pair, preserving first-seen order.
        let mut groups: Vec<((Option<String>, Option<String>), Vec<StagedPaymentRow>)> = Vec::new();
        for row in rows {
            let key = (row.pei_c_value.clone(), row.pei_i_value.clone());
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, bucket)) => bucket.push(row),
                None => groups.push((key, vec![row])),
            }
        }

        for ((pei_c, pei_i), group) in groups {
            self.process_group(ctx, pei_c, pei_i, &group, file.reference_file_id)
                .await?;
        }

        files::move_reference_file(ctx.conn, file, &self.config.processed_dir).await?;
        self.more_files = pending.len() > 1;
        Ok(())
    }

    fn have_more_files_to_process(&self) -> bool {
        self.more_files
    }
}

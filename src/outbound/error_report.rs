//! Extract validation error reports.
//!
//! One CSV per run and per extract kind, carrying every validation issue
//! attached to the records waiting in the error-report state. Reported
//! entities move to the sent state so a rerun never re-reports them.

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::model::{EntityClass, ReferenceFileType, State, StateLogEntity};
use crate::pipeline::{files, Result, Step, StepContext, StepError};
use crate::storage::{employee_store, payment_store, reference_file_store, state_log_store};

use super::{csv_field, timestamped_file_name};

pub const ERROR_REPORT_CSV_HEADER: &str = "record_key,reason,details";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReportKind {
    Claimant,
    Payment,
}

impl ErrorReportKind {
    fn entity_class(&self) -> EntityClass {
        match self {
            ErrorReportKind::Claimant => EntityClass::Employee,
            ErrorReportKind::Payment => EntityClass::Payment,
        }
    }

    fn pickup_state(&self) -> State {
        match self {
            ErrorReportKind::Claimant => State::ClaimantAddToClaimantErrorReport,
            ErrorReportKind::Payment => State::PaymentAddToErrorReport,
        }
    }

    fn sent_state(&self) -> State {
        match self {
            ErrorReportKind::Claimant => State::ClaimantErrorReportSent,
            ErrorReportKind::Payment => State::PaymentErrorReportSent,
        }
    }

    fn file_prefix(&self) -> &'static str {
        match self {
            ErrorReportKind::Claimant => "CLAIMANT-ERROR-REPORT",
            ErrorReportKind::Payment => "PAYMENT-ERROR-REPORT",
        }
    }
}

pub struct ErrorReportStep {
    kind: ErrorReportKind,
    config: PipelineConfig,
}

impl ErrorReportStep {
    pub fn new(kind: ErrorReportKind, config: PipelineConfig) -> ErrorReportStep {
        ErrorReportStep { kind, config }
    }

    async fn record_key(&self, ctx: &mut StepContext<'_>, entity: StateLogEntity) -> Result<String> {
        match entity {
            StateLogEntity::Employee(employee_id) => {
                let employee = employee_store::get_employee(ctx.conn, employee_id)
                    .await?
                    .ok_or_else(|| {
                        StepError::invariant(format!("employee {employee_id} has a state but no row"))
                    })?;
                Ok(employee.tax_identifier)
            }
            StateLogEntity::Payment(payment_id) => {
                let payment = payment_store::get_payment(ctx.conn, payment_id)
                    .await?
                    .ok_or_else(|| {
                        StepError::invariant(format!("payment {payment_id} has a state but no row"))
                    })?;
                Ok(format!("{} / {}", payment.pei_c_value, payment.pei_i_value))
            }
            StateLogEntity::ReferenceFile(id) => Err(StepError::invariant(format!(
                "reference file {id} cannot appear on an error report"
            ))),
        }
    }
}

#[async_trait]
impl Step for ErrorReportStep {
    fn name(&self) -> &'static str {
        match self.kind {
            ErrorReportKind::Claimant => "claimant-error-report",
            ErrorReportKind::Payment => "payment-error-report",
        }
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let waiting = state_log_store::get_all_latest_state_logs_in_end_state(
            ctx.conn,
            self.kind.entity_class(),
            self.kind.pickup_state(),
        )
        .await?;
        if waiting.is_empty() {
            return Ok(());
        }

        let mut body = String::from(ERROR_REPORT_CSV_HEADER);
        body.push('\n');
        let mut entities = Vec::with_capacity(waiting.len());
        for log in &waiting {
            let entity = log.require_entity()?;
            let key = self.record_key(ctx, entity).await?;
            match &log.outcome {
                Some(outcome) if !outcome.validation_issues.is_empty() => {
                    for issue in &outcome.validation_issues {
                        body.push_str(&format!(
                            "{},{},{}\n",
                            csv_field(&key),
                            issue.reason.as_str(),
                            csv_field(&issue.details),
                        ));
                        ctx.increment("error_report_rows");
                    }
                }
                _ => {
                    // A record in the error state with no recorded issues
                    // still has to surface.
                    body.push_str(&format!("{},Unknown,\n", csv_field(&key)));
                    ctx.increment("error_report_rows");
                }
            }
            entities.push(entity);
        }

        let path = self
            .config
            .outbound_dir
            .join(timestamped_file_name(self.kind.file_prefix(), "csv"));
        files::write_outbound_file(&path, &body).await?;

        let reference_file = reference_file_store::create_reference_file(
            ctx.conn,
            &path.to_string_lossy(),
            ReferenceFileType::ErrorReport,
        )
        .await?;
        ctx.set_metric("file", path.to_string_lossy().into_owned().into());

        let import_log_id = ctx.import_log_id();
        for entity in entities {
            if let StateLogEntity::Payment(payment_id) = entity {
                reference_file_store::link_payment(
                    ctx.conn,
                    payment_id,
                    reference_file.reference_file_id,
                )
                .await?;
            }
            state_log_store::create_state_log(
                ctx.conn,
                self.kind.sent_state(),
                None,
                entity,
                import_log_id,
            )
            .await?;
        }
        Ok(())
    }
}

//! Post-processing audit checks and the payment method split.
//!
//! Audit validators run after extract validation and before disbursement.
//! They are advisory: a finding stages an audit-report row (and for the
//! weekly cap, a writeback detail and a distinct state) but never pulls a
//! payment out of the pipeline. Dead ends are reserved for extract
//! validation failures.

pub mod date_mismatch;
pub mod name_mismatch;
pub mod weekly_cap;

#[cfg(test)]
mod tests;

pub use date_mismatch::DateMismatchValidator;
pub use name_mismatch::NameMismatchValidator;
pub use weekly_cap::WeeklyCapValidator;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::model::{
    AbsencePeriod, Claim, Employee, EntityClass, Outcome, Payment, PaymentAuditReportType,
    PaymentMethod, State, StateLogEntity, WritebackTransactionStatus,
};
use crate::pipeline::{Result, Step, StepContext, StepError};
use crate::report::SOURCE_AUDIT_REPORT;
use crate::storage::{audit_store, claim_store, employee_store, payment_store, state_log_store};

/// Everything an audit check may look at for one payment.
pub struct PaymentContext {
    pub payment: Payment,
    pub claim: Claim,
    pub employee: Employee,
    pub absence_periods: Vec<AbsencePeriod>,
}

/// A finding from one audit check.
#[derive(Debug, Clone)]
pub struct AuditFailure {
    pub audit_report_type: PaymentAuditReportType,
    pub details: String,
}

/// One independent audit check. Checks never see each other's findings;
/// the step accumulates them.
#[async_trait]
pub trait PostProcessValidator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn validate(
        &self,
        conn: &mut SqliteConnection,
        payment_ctx: &PaymentContext,
    ) -> Result<Option<AuditFailure>>;
}

/// Runs the audit chain over every payment in the validated state.
pub struct PostProcessingStep {
    validators: Vec<Box<dyn PostProcessValidator>>,
}

impl PostProcessingStep {
    pub fn new(config: &PipelineConfig) -> PostProcessingStep {
        PostProcessingStep {
            validators: vec![
                Box::new(DateMismatchValidator),
                Box::new(NameMismatchValidator),
                Box::new(WeeklyCapValidator::new(config.weekly_benefit_cap)),
            ],
        }
    }

    #[cfg(test)]
    pub fn with_validators(validators: Vec<Box<dyn PostProcessValidator>>) -> PostProcessingStep {
        PostProcessingStep { validators }
    }
}

/// Load the full context for a payment that reached the validated state.
/// Missing claim or employee at this point is a broken invariant, not a
/// validation issue.
pub(crate) async fn load_payment_context(
    conn: &mut SqliteConnection,
    payment_id: Uuid,
) -> Result<PaymentContext> {
    let payment = payment_store::get_payment(conn, payment_id)
        .await?
        .ok_or_else(|| {
            StepError::invariant(format!("payment {payment_id} has a state but no row"))
        })?;
    let claim_id = payment.claim_id.ok_or_else(|| {
        StepError::invariant(format!("validated payment {payment_id} has no claim"))
    })?;
    let claim = claim_store::get_claim(conn, claim_id)
        .await?
        .ok_or_else(|| StepError::invariant(format!("claim {claim_id} missing")))?;
    let employee = employee_store::get_employee(conn, claim.employee_id)
        .await?
        .ok_or_else(|| {
            StepError::invariant(format!("employee {} missing", claim.employee_id))
        })?;
    let absence_periods = claim_store::get_absence_periods(conn, claim_id).await?;
    Ok(PaymentContext {
        payment,
        claim,
        employee,
        absence_periods,
    })
}

fn require_payment_entity(log: &crate::model::StateLog) -> Result<Uuid> {
    match log.require_entity()? {
        StateLogEntity::Payment(payment_id) => Ok(payment_id),
        _ => Err(StepError::invariant(format!(
            "state log {} in a payment work queue has no payment",
            log.state_log_id
        ))),
    }
}

#[async_trait]
impl Step for PostProcessingStep {
    fn name(&self) -> &'static str {
        "payment-post-processing"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let waiting = state_log_store::get_all_latest_state_logs_in_end_state(
            ctx.conn,
            EntityClass::Payment,
            State::PaymentValidated,
        )
        .await?;

        for log in &waiting {
            let payment_id = require_payment_entity(log)?;
            let payment_ctx = load_payment_context(ctx.conn, payment_id).await?;
            ctx.increment("payments_audited");

            let mut failures = Vec::new();
            for validator in &self.validators {
                if let Some(failure) = validator.validate(ctx.conn, &payment_ctx).await? {
                    ctx.increment(&format!("audit_findings_{}", validator.name()));
                    failures.push(failure);
                }
            }
            if failures.is_empty() {
                continue;
            }

            let import_log_id = ctx.import_log_id();
            let over_cap = failures
                .iter()
                .any(|f| f.audit_report_type == PaymentAuditReportType::MaxWeeklyBenefits);
            for failure in &failures {
                audit_store::stage_audit_report_detail(
                    ctx.conn,
                    payment_id,
                    failure.audit_report_type,
                    &failure.details,
                    import_log_id,
                )
                .await?;
            }
            audit_store::add_to_report_queue(ctx.conn, Some(payment_id), SOURCE_AUDIT_REPORT)
                .await?;

            if over_cap {
                // Fail-open: the cap finding is reported to the source
                // system and the payment keeps moving.
                crate::outbound::queue_writeback(
                    ctx.conn,
                    payment_id,
                    WritebackTransactionStatus::WeeklyBenefitsAmountExceeds850,
                    import_log_id,
                )
                .await?;
                state_log_store::create_state_log(
                    ctx.conn,
                    State::PaymentFailedWeeklyCapValidation,
                    Some(Outcome::message("payment exceeds weekly benefit cap")),
                    StateLogEntity::Payment(payment_id),
                    import_log_id,
                )
                .await?;
            } else {
                crate::outbound::queue_writeback(
                    ctx.conn,
                    payment_id,
                    WritebackTransactionStatus::PendingPaymentAudit,
                    import_log_id,
                )
                .await?;
            }
        }
        Ok(())
    }
}

/// Routes validated payments to the transaction queue matching their
/// disbursement method.
pub struct PaymentMethodSplitStep;

#[async_trait]
impl Step for PaymentMethodSplitStep {
    fn name(&self) -> &'static str {
        "payment-method-split"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let mut waiting = state_log_store::get_all_latest_state_logs_in_end_state(
            ctx.conn,
            EntityClass::Payment,
            State::PaymentValidated,
        )
        .await?;
        waiting.extend(
            state_log_store::get_all_latest_state_logs_in_end_state(
                ctx.conn,
                EntityClass::Payment,
                State::PaymentFailedWeeklyCapValidation,
            )
            .await?,
        );

        let import_log_id = ctx.import_log_id();
        for log in &waiting {
            let payment_id = require_payment_entity(log)?;
            let payment = payment_store::get_payment(ctx.conn, payment_id)
                .await?
                .ok_or_else(|| {
                    StepError::invariant(format!("payment {payment_id} has a state but no row"))
                })?;

            let destination = match payment.payment_method {
                PaymentMethod::Ach => State::PaymentAddToPubTransactionEft,
                PaymentMethod::Check => State::PaymentAddToPubTransactionCheck,
                // Unsupported methods are filtered at extract; one here
                // means the filter broke, so the whole step rolls back.
                PaymentMethod::Debit => {
                    return Err(StepError::invariant(format!(
                        "payment {payment_id} reached method split with method {:?}",
                        payment.payment_method
                    )))
                }
            };
            state_log_store::create_state_log(
                ctx.conn,
                destination,
                None,
                StateLogEntity::Payment(payment_id),
                import_log_id,
            )
            .await?;
            match destination {
                State::PaymentAddToPubTransactionEft => ctx.increment("payments_routed_eft"),
                _ => ctx.increment("payments_routed_check"),
            }
        }
        Ok(())
    }
}

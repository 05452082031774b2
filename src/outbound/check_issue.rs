//! PUB check issue file generation.
//!
//! Payments queued for check disbursement get sequential check numbers
//! and one fixed-width record each on a single issue file per run.

use async_trait::async_trait;
use chrono::Utc;

use crate::config::PipelineConfig;
use crate::model::{
    EntityClass, Payment, ReferenceFileType, State, StateLogEntity, WritebackTransactionStatus,
};
use crate::pipeline::{files, Result, Step, StepContext, StepError};
use crate::storage::{payment_store, reference_file_store, state_log_store};

use super::fixed_width::{join_records, CheckIssueField, CheckIssueRecord};
use super::{amount_in_cents, queue_writeback, require_payment_entity, timestamped_file_name};

/// Issuing account printed on every check record.
const ISSUING_ACCOUNT: &str = "PUBLEAVE0001";

/// Check numbering starts above this when no check has ever been issued.
const CHECK_NUMBER_SEED: i64 = 1000;

/// Positional layout of one check issue record. Identifier and name
/// fields truncate; a mangled name is a cosmetic defect, a mangled
/// amount or check number is not.
const CHECK_ISSUE_LAYOUT: [CheckIssueField; 6] = [
    CheckIssueField::alphanumeric("account_number", 16),
    CheckIssueField::numeric("check_number", 10),
    CheckIssueField::numeric("issue_date", 8),
    CheckIssueField::numeric("amount", 10),
    CheckIssueField::alphanumeric("payee_id", 12).with_truncation(),
    CheckIssueField::alphanumeric("payee_name", 40).with_truncation(),
];

fn render_check_record(payment: &Payment, check_number: i64, issue_date: &str) -> Result<String> {
    let payee_name = payment.payee_name.as_deref().ok_or_else(|| {
        StepError::invariant(format!(
            "check payment {} has no payee name",
            payment.payment_id
        ))
    })?;
    let record = CheckIssueRecord::new(&CHECK_ISSUE_LAYOUT);
    Ok(record.render(&[
        ISSUING_ACCOUNT,
        &check_number.to_string(),
        issue_date,
        &amount_in_cents(payment.amount),
        &payment.pei_i_value,
        payee_name,
    ])?)
}

pub struct CheckIssueStep {
    config: PipelineConfig,
}

impl CheckIssueStep {
    pub fn new(config: PipelineConfig) -> CheckIssueStep {
        CheckIssueStep { config }
    }
}

#[async_trait]
impl Step for CheckIssueStep {
    fn name(&self) -> &'static str {
        "pub-check-issue"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let waiting = state_log_store::get_all_latest_state_logs_in_end_state(
            ctx.conn,
            EntityClass::Payment,
            State::PaymentAddToPubTransactionCheck,
        )
        .await?;
        if waiting.is_empty() {
            return Ok(());
        }

        let mut next_check = payment_store::max_check_number(ctx.conn)
            .await?
            .unwrap_or(CHECK_NUMBER_SEED)
            + 1;
        let issue_date = Utc::now().format("%Y%m%d").to_string();

        let mut lines = Vec::with_capacity(waiting.len());
        let mut payment_ids = Vec::with_capacity(waiting.len());
        for log in &waiting {
            let payment_id = require_payment_entity(log)?;
            let payment = payment_store::get_payment(ctx.conn, payment_id)
                .await?
                .ok_or_else(|| {
                    StepError::invariant(format!("payment {payment_id} has a state but no row"))
                })?;

            let check_number = next_check;
            next_check += 1;
            payment_store::set_check_number(ctx.conn, payment_id, check_number).await?;
            lines.push(render_check_record(&payment, check_number, &issue_date)?);
            payment_ids.push(payment_id);
            ctx.increment("checks_issued");
        }

        let path = self
            .config
            .outbound_dir
            .join(timestamped_file_name("PUB-CHECK", "txt"));
        files::write_outbound_file(&path, &join_records(&lines)).await?;

        let reference_file = reference_file_store::create_reference_file(
            ctx.conn,
            &path.to_string_lossy(),
            ReferenceFileType::PubCheck,
        )
        .await?;
        ctx.set_metric("file", path.to_string_lossy().into_owned().into());

        let import_log_id = ctx.import_log_id();
        for payment_id in payment_ids {
            reference_file_store::link_payment(
                ctx.conn,
                payment_id,
                reference_file.reference_file_id,
            )
            .await?;
            state_log_store::create_state_log(
                ctx.conn,
                State::PaymentPubTransactionCheckSent,
                None,
                StateLogEntity::Payment(payment_id),
                import_log_id,
            )
            .await?;
            queue_writeback(
                ctx.conn,
                payment_id,
                WritebackTransactionStatus::PaidProcessed,
                import_log_id,
            )
            .await?;
        }
        Ok(())
    }
}

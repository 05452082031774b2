//! PUB EFT transaction file generation.
//!
//! Payments queued for ACH disbursement are written as fixed-width entry
//! records, one file per run. Missing EFT details here mean the extract
//! validation was bypassed; the step fails rather than emit a bad entry.

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::model::{
    EntityClass, Payment, ReferenceFileType, State, StateLogEntity, WritebackTransactionStatus,
};
use crate::pipeline::{files, Result, Step, StepContext, StepError};
use crate::storage::{payment_store, reference_file_store, state_log_store};

use super::fixed_width::{join_records, CheckIssueField, CheckIssueRecord};
use super::{amount_in_cents, queue_writeback, require_payment_entity, timestamped_file_name};

/// ACH credit to a checking account.
const TRANSACTION_CODE_CHECKING_CREDIT: &str = "22";

const EFT_ENTRY_LAYOUT: [CheckIssueField; 6] = [
    CheckIssueField::numeric("transaction_code", 2),
    CheckIssueField::numeric("routing_number", 9),
    CheckIssueField::alphanumeric("account_number", 17),
    CheckIssueField::numeric("amount", 10),
    CheckIssueField::alphanumeric("individual_name", 22).with_truncation(),
    CheckIssueField::alphanumeric("payment_id", 36),
];

fn render_eft_entry(payment: &Payment) -> Result<String> {
    let routing_number = payment.routing_number.as_deref().ok_or_else(|| {
        StepError::invariant(format!(
            "EFT payment {} has no routing number",
            payment.payment_id
        ))
    })?;
    let account_number = payment.account_number.as_deref().ok_or_else(|| {
        StepError::invariant(format!(
            "EFT payment {} has no account number",
            payment.payment_id
        ))
    })?;
    let name = payment.payee_name.as_deref().unwrap_or("");
    let record = CheckIssueRecord::new(&EFT_ENTRY_LAYOUT);
    Ok(record.render(&[
        TRANSACTION_CODE_CHECKING_CREDIT,
        routing_number,
        account_number,
        &amount_in_cents(payment.amount),
        name,
        &payment.payment_id.to_string(),
    ])?)
}

pub struct EftStep {
    config: PipelineConfig,
}

impl EftStep {
    pub fn new(config: PipelineConfig) -> EftStep {
        EftStep { config }
    }
}

#[async_trait]
impl Step for EftStep {
    fn name(&self) -> &'static str {
        "pub-eft-transaction"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let waiting = state_log_store::get_all_latest_state_logs_in_end_state(
            ctx.conn,
            EntityClass::Payment,
            State::PaymentAddToPubTransactionEft,
        )
        .await?;
        if waiting.is_empty() {
            return Ok(());
        }

        let mut lines = Vec::with_capacity(waiting.len());
        let mut payment_ids = Vec::with_capacity(waiting.len());
        for log in &waiting {
            let payment_id = require_payment_entity(log)?;
            let payment = payment_store::get_payment(ctx.conn, payment_id)
                .await?
                .ok_or_else(|| {
                    StepError::invariant(format!("payment {payment_id} has a state but no row"))
                })?;
            lines.push(render_eft_entry(&payment)?);
            payment_ids.push(payment_id);
            ctx.increment("eft_entries_written");
        }

        let path = self
            .config
            .outbound_dir
            .join(timestamped_file_name("PUB-EFT", "txt"));
        files::write_outbound_file(&path, &join_records(&lines)).await?;

        let reference_file = reference_file_store::create_reference_file(
            ctx.conn,
            &path.to_string_lossy(),
            ReferenceFileType::PubEft,
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
                State::PaymentPubTransactionEftSent,
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

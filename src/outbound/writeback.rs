//! Transaction-status writeback to the case-management system.
//!
//! Collects every pending writeback detail into one CSV, regardless of
//! which stage staged it, and marks the details sent in the same
//! transaction. A payment whose paid status goes out here is complete.

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::model::{Flow, ReferenceFileType, State, StateLogEntity, WritebackTransactionStatus};
use crate::pipeline::{files, Result, Step, StepContext, StepError};
use crate::storage::audit_store::WritebackDetail;
use crate::storage::{audit_store, payment_store, reference_file_store, state_log_store};

use super::timestamped_file_name;

/// Fixed header; the receiving system matches columns by name and order.
pub const WRITEBACK_CSV_HEADER: &str =
    "pei_c_value,pei_i_value,transaction_status,transaction_status_date";

pub struct WritebackStep {
    config: PipelineConfig,
}

impl WritebackStep {
    pub fn new(config: PipelineConfig) -> WritebackStep {
        WritebackStep { config }
    }
}

async fn writeback_row(
    ctx: &mut StepContext<'_>,
    detail: &WritebackDetail,
) -> Result<String> {
    let payment = payment_store::get_payment(ctx.conn, detail.payment_id)
        .await?
        .ok_or_else(|| {
            StepError::invariant(format!(
                "writeback detail {} references missing payment {}",
                detail.writeback_detail_id, detail.payment_id
            ))
        })?;
    Ok(format!(
        "{},{},{},{}",
        payment.pei_c_value,
        payment.pei_i_value,
        detail.transaction_status.as_str(),
        detail.created_at.to_rfc3339(),
    ))
}

#[async_trait]
impl Step for WritebackStep {
    fn name(&self) -> &'static str {
        "status-writeback"
    }

    async fn run_step(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let details = audit_store::list_pending_writeback_details(ctx.conn).await?;
        if details.is_empty() {
            return Ok(());
        }

        let mut body = String::from(WRITEBACK_CSV_HEADER);
        body.push('\n');
        for detail in &details {
            body.push_str(&writeback_row(ctx, detail).await?);
            body.push('\n');
            ctx.increment("writeback_rows_written");
        }

        let path = self
            .config
            .outbound_dir
            .join(timestamped_file_name("STATUS-WRITEBACK", "csv"));
        files::write_outbound_file(&path, &body).await?;

        let reference_file = reference_file_store::create_reference_file(
            ctx.conn,
            &path.to_string_lossy(),
            ReferenceFileType::FineosWriteback,
        )
        .await?;
        ctx.set_metric("file", path.to_string_lossy().into_owned().into());

        let detail_ids: Vec<i64> = details.iter().map(|d| d.writeback_detail_id).collect();
        audit_store::mark_writeback_details_sent(ctx.conn, &detail_ids).await?;

        let import_log_id = ctx.import_log_id();
        let payment_ids: BTreeSet<Uuid> = details.iter().map(|d| d.payment_id).collect();
        for payment_id in &payment_ids {
            reference_file_store::link_payment(
                ctx.conn,
                *payment_id,
                reference_file.reference_file_id,
            )
            .await?;
            state_log_store::create_state_log(
                ctx.conn,
                State::WritebackSent,
                None,
                StateLogEntity::Payment(*payment_id),
                import_log_id,
            )
            .await?;
        }

        // A paid status going out closes the payment's lifecycle.
        for detail in &details {
            if detail.transaction_status != WritebackTransactionStatus::PaidProcessed {
                continue;
            }
            let latest = state_log_store::get_latest_state_log_in_flow(
                ctx.conn,
                &StateLogEntity::Payment(detail.payment_id),
                Flow::DelegatedPayment,
            )
            .await?;
            let sent = matches!(
                latest.and_then(|log| log.end_state),
                Some(State::PaymentPubTransactionEftSent)
                    | Some(State::PaymentPubTransactionCheckSent)
            );
            if sent {
                state_log_store::create_state_log(
                    ctx.conn,
                    State::PaymentComplete,
                    None,
                    StateLogEntity::Payment(detail.payment_id),
                    import_log_id,
                )
                .await?;
                ctx.increment("payments_completed");
            }
        }
        Ok(())
    }
}

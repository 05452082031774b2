//! Outbound file generation: PUB transaction files, the status writeback
//! and error reports.
//!
//! Every produced file gets a reference file row before the step commits,
//! and every payment placed on a file is linked to that row. File names
//! carry a UTC timestamp so reruns never clobber an earlier batch.

pub mod check_issue;
pub mod eft;
pub mod error_report;
pub mod fixed_width;
pub mod writeback;


pub use check_issue::CheckIssueStep;
pub use eft::EftStep;
pub use error_report::{ErrorReportKind, ErrorReportStep};
pub use writeback::WritebackStep;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::model::{State, StateLog, StateLogEntity, WritebackTransactionStatus};
use crate::pipeline::{Result, StepError};
use crate::storage::{audit_store, state_log_store};

/// Quote a CSV field only when it needs it.
pub(crate) fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn timestamped_file_name(prefix: &str, extension: &str) -> String {
    format!("{prefix}-{}.{extension}", Utc::now().format("%Y%m%d-%H%M%S"))
}

/// Whole cents, for fixed-width amount fields with an implied decimal
/// point.
fn amount_in_cents(amount: Decimal) -> String {
    (amount * Decimal::ONE_HUNDRED).round().to_string()
}

fn require_payment_entity(log: &StateLog) -> Result<Uuid> {
    match log.require_entity()? {
        StateLogEntity::Payment(payment_id) => Ok(payment_id),
        _ => Err(StepError::invariant(format!(
            "state log {} in a payment work queue has no payment",
            log.state_log_id
        ))),
    }
}

/// Queue a payment for the writeback file. Stages the transaction-status
/// detail and moves the payment's writeback flow to the pickup state.
pub(crate) async fn queue_writeback(
    conn: &mut SqliteConnection,
    payment_id: Uuid,
    transaction_status: WritebackTransactionStatus,
    import_log_id: Option<i64>,
) -> Result<()> {
    audit_store::create_writeback_detail(conn, payment_id, transaction_status).await?;
    state_log_store::create_state_log(
        conn,
        State::AddToWriteback,
        None,
        StateLogEntity::Payment(payment_id),
        import_log_id,
    )
    .await?;
    Ok(())
}

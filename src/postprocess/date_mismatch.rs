//! Payment-period-vs-absence-period containment check.

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::model::{AbsencePeriod, Payment, PaymentAuditReportType};
use crate::pipeline::Result;
use crate::storage::helpers::format_date;

use super::{AuditFailure, PaymentContext, PostProcessValidator};

/// True when the payment's period is not fully contained (inclusive) in
/// any absence period of its claim. Ad-hoc payments are issued outside
/// regular benefit scheduling and are exempt.
pub fn is_payment_date_mismatch(payment: &Payment, absence_periods: &[AbsencePeriod]) -> bool {
    if payment.is_adhoc_payment {
        return false;
    }
    !absence_periods
        .iter()
        .any(|period| period.contains(payment.period_start_date, payment.period_end_date))
}

pub struct DateMismatchValidator;

#[async_trait]
impl PostProcessValidator for DateMismatchValidator {
    fn name(&self) -> &'static str {
        "date_mismatch"
    }

    async fn validate(
        &self,
        _conn: &mut SqliteConnection,
        payment_ctx: &PaymentContext,
    ) -> Result<Option<AuditFailure>> {
        if !is_payment_date_mismatch(&payment_ctx.payment, &payment_ctx.absence_periods) {
            return Ok(None);
        }
        let known: Vec<String> = payment_ctx
            .absence_periods
            .iter()
            .map(|p| format!("[{} - {}]", format_date(p.start_date), format_date(p.end_date)))
            .collect();
        Ok(Some(AuditFailure {
            audit_report_type: PaymentAuditReportType::DateMismatch,
            details: format!(
                "payment period [{} - {}] outside absence periods {}",
                format_date(payment_ctx.payment.period_start_date),
                format_date(payment_ctx.payment.period_end_date),
                known.join(", "),
            ),
        }))
    }
}

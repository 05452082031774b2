//! Payee-name-vs-employee-record check.

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::model::PaymentAuditReportType;
use crate::pipeline::Result;

use super::{AuditFailure, PaymentContext, PostProcessValidator};

/// Case- and whitespace-insensitive comparison; extracts vary in casing
/// and padding for the same person.
fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub struct NameMismatchValidator;

#[async_trait]
impl PostProcessValidator for NameMismatchValidator {
    fn name(&self) -> &'static str {
        "name_mismatch"
    }

    async fn validate(
        &self,
        _conn: &mut SqliteConnection,
        payment_ctx: &PaymentContext,
    ) -> Result<Option<AuditFailure>> {
        // A payment without a payee name was already flagged at extract.
        let Some(payee_name) = payment_ctx.payment.payee_name.as_deref() else {
            return Ok(None);
        };
        let employee_name = payment_ctx.employee.full_name();
        if normalize(payee_name) == normalize(&employee_name) {
            return Ok(None);
        }
        Ok(Some(AuditFailure {
            audit_report_type: PaymentAuditReportType::NameMismatch,
            details: format!(
                "payee name {payee_name:?} does not match employee record {employee_name:?}"
            ),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ignores_case_and_padding() {
        assert_eq!(normalize("  alice   halvorsen "), normalize("ALICE HALVORSEN"));
        assert_ne!(normalize("ALICE HALVORSEN"), normalize("ALICE HALVORSON"));
    }
}

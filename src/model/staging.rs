//! Staged extract rows.
//!
//! Raw rows landed by the upstream file-to-table loader. Every field is
//! text exactly as it appeared in the extract; the extract processors own
//! all parsing. Rows are read-only to the pipeline and carry
//! `reference_file_id` / `import_log_id` for traceability.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StagedClaimantRow {
    pub staged_claimant_row_id: i64,
    pub reference_file_id: Uuid,
    pub import_log_id: Option<i64>,
    pub absence_case_number: Option<String>,
    /// Compound absence period id, e.g. "ABS-123-4".
    pub absence_period_index: Option<String>,
    pub tax_identifier: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub absence_period_start: Option<String>,
    pub absence_period_end: Option<String>,
    pub payment_method: Option<String>,
    pub routing_number: Option<String>,
    pub account_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StagedPaymentRow {
    pub staged_payment_row_id: i64,
    pub reference_file_id: Uuid,
    pub import_log_id: Option<i64>,
    pub pei_c_value: Option<String>,
    pub pei_i_value: Option<String>,
    pub absence_case_number: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub amount: Option<String>,
    pub payment_method: Option<String>,
    /// "Y" marks an ad-hoc payment.
    pub is_adhoc: Option<String>,
    pub payee_name: Option<String>,
}

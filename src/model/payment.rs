//! Persistent domain entities the pipeline owns or references.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Employee {
    pub employee_id: Uuid,
    pub tax_identifier: String,
    pub first_name: String,
    pub last_name: String,
    /// EFT destination from the claimant extract, for ACH disbursement.
    pub routing_number: Option<String>,
    pub account_number: Option<String>,
}

impl Employee {
    /// Name as it appears on outbound records: "FIRST LAST".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct Claim {
    pub claim_id: Uuid,
    pub employee_id: Uuid,
    pub absence_case_number: String,
}

/// Composite key identifying an absence period within a claim.
///
/// Parsed from compound extract strings like `"ABS-123-4"` (class id 123,
/// index id 4). Source-provided database ids are never trusted; existing
/// rows are matched by this key before deciding insert-vs-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbsencePeriodKey {
    pub class_id: i64,
    pub index_id: i64,
}

/// Failure to parse an absence period compound key.
#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed absence period id: {0:?}")]
pub struct AbsencePeriodKeyError(pub String);

impl FromStr for AbsencePeriodKey {
    type Err = AbsencePeriodKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut segments = value.rsplit('-');
        let index = segments
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| AbsencePeriodKeyError(value.to_string()))?;
        let class = segments
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| AbsencePeriodKeyError(value.to_string()))?;
        if segments.next().is_none() {
            // Need at least a leading segment like "ABS" before the two ids.
            return Err(AbsencePeriodKeyError(value.to_string()));
        }
        Ok(AbsencePeriodKey {
            class_id: class,
            index_id: index,
        })
    }
}

impl fmt::Display for AbsencePeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.class_id, self.index_id)
    }
}

#[derive(Debug, Clone)]
pub struct AbsencePeriod {
    pub absence_period_id: Uuid,
    pub claim_id: Uuid,
    pub key: AbsencePeriodKey,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl AbsencePeriod {
    /// Inclusive containment of a payment period within this absence period.
    pub fn contains(&self, period_start: NaiveDate, period_end: NaiveDate) -> bool {
        self.start_date <= period_start && period_end <= self.end_date
    }
}

/// How a payment is disbursed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Ach,
    Check,
    /// Valid in the source system but not supported by the PUB pipeline.
    Debit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Ach => "Elec Funds Transfer",
            PaymentMethod::Check => "Check",
            PaymentMethod::Debit => "Debit",
        }
    }

    pub fn from_extract_str(value: &str) -> Option<PaymentMethod> {
        match value {
            "Elec Funds Transfer" => Some(PaymentMethod::Ach),
            "Check" => Some(PaymentMethod::Check),
            "Debit" => Some(PaymentMethod::Debit),
            _ => None,
        }
    }
}

/// Transaction statuses written back to the case-management system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritebackTransactionStatus {
    PaidProcessed,
    PendingPaymentAudit,
    WeeklyBenefitsAmountExceeds850,
}

impl WritebackTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritebackTransactionStatus::PaidProcessed => "PAID_PROCESSED",
            WritebackTransactionStatus::PendingPaymentAudit => "PENDING_PAYMENT_AUDIT",
            WritebackTransactionStatus::WeeklyBenefitsAmountExceeds850 => {
                "WEEKLY_BENEFITS_AMOUNT_EXCEEDS_850"
            }
        }
    }

    pub fn from_str(value: &str) -> Option<WritebackTransactionStatus> {
        match value {
            "PAID_PROCESSED" => Some(WritebackTransactionStatus::PaidProcessed),
            "PENDING_PAYMENT_AUDIT" => Some(WritebackTransactionStatus::PendingPaymentAudit),
            "WEEKLY_BENEFITS_AMOUNT_EXCEEDS_850" => {
                Some(WritebackTransactionStatus::WeeklyBenefitsAmountExceeds850)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Payment {
    pub payment_id: Uuid,
    /// `None` when the extract referenced an unknown absence case; such
    /// payments carry a `ClaimNotFound` issue and never leave the error
    /// path.
    pub claim_id: Option<Uuid>,
    /// Compound identifier from the source extract (C / I values).
    pub pei_c_value: String,
    pub pei_i_value: String,
    pub period_start_date: NaiveDate,
    pub period_end_date: NaiveDate,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub is_adhoc_payment: bool,
    /// Payee name as it appeared on the extract, for mismatch checks.
    pub payee_name: Option<String>,
    /// EFT destination, required for ACH payments.
    pub routing_number: Option<String>,
    pub account_number: Option<String>,
    /// Assigned when the payment is placed on a PUB check file.
    pub check_number: Option<i64>,
    pub import_log_id: Option<i64>,
}

/// Closed enumeration of file types the pipeline produces or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFileType {
    ClaimantExtract,
    PaymentExtract,
    PubCheck,
    PubEft,
    FineosWriteback,
    ErrorReport,
    Report,
}

impl ReferenceFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceFileType::ClaimantExtract => "CLAIMANT_EXTRACT",
            ReferenceFileType::PaymentExtract => "PAYMENT_EXTRACT",
            ReferenceFileType::PubCheck => "PUB_CHECK",
            ReferenceFileType::PubEft => "PUB_EFT",
            ReferenceFileType::FineosWriteback => "FINEOS_WRITEBACK",
            ReferenceFileType::ErrorReport => "ERROR_REPORT",
            ReferenceFileType::Report => "REPORT",
        }
    }

    pub fn from_str(value: &str) -> Option<ReferenceFileType> {
        match value {
            "CLAIMANT_EXTRACT" => Some(ReferenceFileType::ClaimantExtract),
            "PAYMENT_EXTRACT" => Some(ReferenceFileType::PaymentExtract),
            "PUB_CHECK" => Some(ReferenceFileType::PubCheck),
            "PUB_EFT" => Some(ReferenceFileType::PubEft),
            "FINEOS_WRITEBACK" => Some(ReferenceFileType::FineosWriteback),
            "ERROR_REPORT" => Some(ReferenceFileType::ErrorReport),
            "REPORT" => Some(ReferenceFileType::Report),
            _ => None,
        }
    }
}

/// Every file the pipeline touches has exactly one reference file row.
/// Moving the file between directories updates `file_location` in lockstep
/// with the actual move, never one without the other.
#[derive(Debug, Clone)]
pub struct ReferenceFile {
    pub reference_file_id: Uuid,
    pub file_location: String,
    pub reference_file_type: ReferenceFileType,
    pub created_at: DateTime<Utc>,
}

/// Which audit check rejected a payment into the audit report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAuditReportType {
    DateMismatch,
    NameMismatch,
    MaxWeeklyBenefits,
}

impl PaymentAuditReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentAuditReportType::DateMismatch => "DATE_MISMATCH",
            PaymentAuditReportType::NameMismatch => "NAME_MISMATCH",
            PaymentAuditReportType::MaxWeeklyBenefits => "MAX_WEEKLY_BENEFITS",
        }
    }

    pub fn from_str(value: &str) -> Option<PaymentAuditReportType> {
        match value {
            "DATE_MISMATCH" => Some(PaymentAuditReportType::DateMismatch),
            "NAME_MISMATCH" => Some(PaymentAuditReportType::NameMismatch),
            "MAX_WEEKLY_BENEFITS" => Some(PaymentAuditReportType::MaxWeeklyBenefits),
            _ => None,
        }
    }
}

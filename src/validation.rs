//! Per-record validation accumulation.
//!
//! Validation issues are values, never exceptions: many independent checks
//! add issues to one container and the routing decision (happy path vs
//! error state) is made once, after all checks ran. A record failing
//! validation never halts the batch.

use serde::{Deserialize, Serialize};

/// Machine-readable reason codes for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationReason {
    MissingField,
    InvalidValue,
    ValueConversionError,
    ClaimNotFound,
    EmployeeNotFound,
    MissingEftInformation,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::MissingField => "MissingField",
            ValidationReason::InvalidValue => "InvalidValue",
            ValidationReason::ValueConversionError => "ValueConversionError",
            ValidationReason::ClaimNotFound => "ClaimNotFound",
            ValidationReason::EmployeeNotFound => "EmployeeNotFound",
            ValidationReason::MissingEftInformation => "MissingEftInformation",
        }
    }
}

/// One issue discovered while processing a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub reason: ValidationReason,
    pub details: String,
}

/// Accumulates issues for one logical record.
///
/// An empty container means the record is valid; a non-empty container
/// routes the record to an error/audit path instead of the happy path.
#[derive(Debug, Clone, Default)]
pub struct ValidationContainer {
    record_key: String,
    issues: Vec<ValidationIssue>,
}

impl ValidationContainer {
    /// `record_key` identifies the source record in error reports
    /// (absence case number, payment C/I pair, ...).
    pub fn new(record_key: impl Into<String>) -> ValidationContainer {
        ValidationContainer {
            record_key: record_key.into(),
            issues: Vec::new(),
        }
    }

    pub fn record_key(&self) -> &str {
        &self.record_key
    }

    pub fn add_validation_issue(&mut self, reason: ValidationReason, details: impl Into<String>) {
        self.issues.push(ValidationIssue {
            reason,
            details: details.into(),
        });
    }

    pub fn has_validation_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    /// Require a field to be present and non-blank, returning it borrowed.
    /// Adds a `MissingField` issue and returns `None` otherwise.
    pub fn require<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => {
                self.add_validation_issue(ValidationReason::MissingField, field);
                None
            }
        }
    }
}

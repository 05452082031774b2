//! Inbound extract processing.
//!
//! Two steps consume staged extract rows file by file: the claimant
//! extract builds employees, claims and absence periods; the payment
//! extract builds payments. Both treat malformed records as data, not
//! errors: every issue lands in a validation container and routes the
//! record to an error-report state while the batch continues.

pub mod claimant;
pub mod payment;

#[cfg(test)]
mod tests;

pub use claimant::ClaimantExtractStep;
pub use payment::PaymentExtractStep;

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::model::{ReferenceFile, ReferenceFileType};
use crate::storage::reference_file_store;
use crate::validation::{ValidationContainer, ValidationReason};

use crate::pipeline::Result;

pub(crate) const EXTRACT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Extract files of a type still waiting under the received directory,
/// oldest first.
pub(crate) async fn pending_extract_files(
    conn: &mut SqliteConnection,
    reference_file_type: ReferenceFileType,
    received_dir: &std::path::Path,
) -> Result<Vec<ReferenceFile>> {
    Ok(reference_file_store::list_reference_files_under(
        conn,
        reference_file_type,
        &received_dir.to_string_lossy(),
    )
    .await?)
}

/// Parse a required date field, recording a missing-field or conversion
/// issue instead of failing.
pub(crate) fn parse_date_field(
    container: &mut ValidationContainer,
    field: &str,
    value: Option<&str>,
) -> Option<NaiveDate> {
    let raw = container.require(field, value)?;
    match NaiveDate::parse_from_str(raw, EXTRACT_DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            container.add_validation_issue(
                ValidationReason::ValueConversionError,
                format!("{field}: {raw}"),
            );
            None
        }
    }
}

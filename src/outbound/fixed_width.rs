//! Fixed-width record rendering for bank-facing files.
//!
//! Numeric fields right-justify and zero-pad; alphanumeric fields
//! left-justify and space-pad. Overflow is an error unless the field
//! opted into truncation, in which case numeric truncation keeps the
//! rightmost digits (the significant end of zero-padded identifiers) and
//! alphanumeric truncation keeps the prefix.

/// Record separator for fixed-width files; the receiving bank systems
/// expect CRLF regardless of platform.
pub const RECORD_SEPARATOR: &str = "\r\n";

#[derive(Debug, Clone, thiserror::Error)]
pub enum FixedWidthError {
    #[error("value {value:?} overflows field {field} (width {width})")]
    Overflow {
        field: &'static str,
        value: String,
        width: usize,
    },

    #[error("record expects {expected} values, got {got}")]
    ValueCount { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Justify {
    /// Right-justified, zero-padded.
    Numeric,
    /// Left-justified, space-padded.
    Alphanumeric,
}

/// One column of a check-issue style fixed-width record.
#[derive(Debug, Clone, Copy)]
pub struct CheckIssueField {
    name: &'static str,
    width: usize,
    justify: Justify,
    truncate_on_overflow: bool,
}

impl CheckIssueField {
    pub const fn numeric(name: &'static str, width: usize) -> CheckIssueField {
        CheckIssueField {
            name,
            width,
            justify: Justify::Numeric,
            truncate_on_overflow: false,
        }
    }

    pub const fn alphanumeric(name: &'static str, width: usize) -> CheckIssueField {
        CheckIssueField {
            name,
            width,
            justify: Justify::Alphanumeric,
            truncate_on_overflow: false,
        }
    }

    pub const fn with_truncation(mut self) -> CheckIssueField {
        self.truncate_on_overflow = true;
        self
    }

    pub fn render(&self, value: &str) -> Result<String, FixedWidthError> {
        // Widths count characters, matching the padding arms below; byte
        // slicing would split multi-byte names.
        let length = value.chars().count();
        if length > self.width {
            if !self.truncate_on_overflow {
                return Err(FixedWidthError::Overflow {
                    field: self.name,
                    value: value.to_string(),
                    width: self.width,
                });
            }
            return Ok(match self.justify {
                Justify::Numeric => value.chars().skip(length - self.width).collect(),
                Justify::Alphanumeric => value.chars().take(self.width).collect(),
            });
        }
        Ok(match self.justify {
            Justify::Numeric => format!("{value:0>width$}", width = self.width),
            Justify::Alphanumeric => format!("{value:<width$}", width = self.width),
        })
    }
}

/// An ordered field layout. Values render positionally.
#[derive(Debug, Clone, Copy)]
pub struct CheckIssueRecord<'a> {
    fields: &'a [CheckIssueField],
}

impl<'a> CheckIssueRecord<'a> {
    pub const fn new(fields: &'a [CheckIssueField]) -> CheckIssueRecord<'a> {
        CheckIssueRecord { fields }
    }

    pub fn render(&self, values: &[&str]) -> Result<String, FixedWidthError> {
        if values.len() != self.fields.len() {
            return Err(FixedWidthError::ValueCount {
                expected: self.fields.len(),
                got: values.len(),
            });
        }
        let mut line = String::new();
        for (field, value) in self.fields.iter().zip(values) {
            line.push_str(&field.render(value)?);
        }
        Ok(line)
    }
}

/// Join rendered records into a file body with a trailing separator.
pub fn join_records(lines: &[String]) -> String {
    let mut body = lines.join(RECORD_SEPARATOR);
    if !body.is_empty() {
        body.push_str(RECORD_SEPARATOR);
    }
    body
}

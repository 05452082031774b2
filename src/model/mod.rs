//! Domain model types.

mod flow;
mod import_log;
mod payment;
mod staging;
mod state_log;

pub use flow::{Flow, State};
pub use import_log::{ImportLog, ImportStatus};
pub use payment::{
    AbsencePeriod, AbsencePeriodKey, Claim, Employee, Payment, PaymentAuditReportType,
    PaymentMethod, ReferenceFile, ReferenceFileType, WritebackTransactionStatus,
};
pub use staging::{StagedClaimantRow, StagedPaymentRow};
pub use state_log::{EntityClass, MissingEntity, Outcome, StateLog, StateLogEntity};

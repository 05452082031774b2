//! Flows and states of the payment state machine.
//!
//! A `Flow` is a named category of work; a `State` is a checkpoint within
//! exactly one flow. States form a directed graph whose edges are not
//! statically declared - any component may transition an entity from its
//! current state to any other state in the same flow by naming the
//! destination.

/// A named category of state-machine progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flow {
    /// Claimant ingestion from the case-management extract.
    DelegatedClaimant,
    /// Payment lifecycle: extract, validation, PUB transaction, completion.
    DelegatedPayment,
    /// Outbound writeback of payment transaction statuses.
    DelegatedPeiWriteback,
}

impl Flow {
    /// Stable database key for this flow.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Flow::DelegatedClaimant => "DELEGATED_CLAIMANT",
            Flow::DelegatedPayment => "DELEGATED_PAYMENT",
            Flow::DelegatedPeiWriteback => "DELEGATED_PEI_WRITEBACK",
        }
    }

    /// Parse a flow from its database key.
    pub fn from_db_str(value: &str) -> Option<Flow> {
        match value {
            "DELEGATED_CLAIMANT" => Some(Flow::DelegatedClaimant),
            "DELEGATED_PAYMENT" => Some(Flow::DelegatedPayment),
            "DELEGATED_PEI_WRITEBACK" => Some(Flow::DelegatedPeiWriteback),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Flow::DelegatedClaimant => "Delegated Claimant",
            Flow::DelegatedPayment => "Delegated Payment",
            Flow::DelegatedPeiWriteback => "PEI Writeback",
        }
    }
}

/// A named checkpoint within a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    // -- Delegated Claimant -------------------------------------------------
    ClaimantStaged,
    ClaimantExtracted,
    ClaimantAddToClaimantErrorReport,
    ClaimantErrorReportSent,

    // -- Delegated Payment --------------------------------------------------
    PaymentStaged,
    PaymentValidated,
    PaymentAddToErrorReport,
    PaymentErrorReportSent,
    PaymentFailedWeeklyCapValidation,
    PaymentAddToPubTransactionEft,
    PaymentAddToPubTransactionCheck,
    PaymentPubTransactionEftSent,
    PaymentPubTransactionCheckSent,
    PaymentComplete,

    // -- PEI Writeback ------------------------------------------------------
    AddToWriteback,
    WritebackSent,
}

impl State {
    /// The flow this state belongs to. Each state belongs to exactly one flow.
    pub fn flow(&self) -> Flow {
        match self {
            State::ClaimantStaged
            | State::ClaimantExtracted
            | State::ClaimantAddToClaimantErrorReport
            | State::ClaimantErrorReportSent => Flow::DelegatedClaimant,

            State::PaymentStaged
            | State::PaymentValidated
            | State::PaymentAddToErrorReport
            | State::PaymentErrorReportSent
            | State::PaymentFailedWeeklyCapValidation
            | State::PaymentAddToPubTransactionEft
            | State::PaymentAddToPubTransactionCheck
            | State::PaymentPubTransactionEftSent
            | State::PaymentPubTransactionCheckSent
            | State::PaymentComplete => Flow::DelegatedPayment,

            State::AddToWriteback | State::WritebackSent => Flow::DelegatedPeiWriteback,
        }
    }

    /// Stable database key for this state.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            State::ClaimantStaged => "DELEGATED_CLAIMANT_STAGED",
            State::ClaimantExtracted => "DELEGATED_CLAIMANT_EXTRACTED",
            State::ClaimantAddToClaimantErrorReport => {
                "DELEGATED_CLAIMANT_ADD_TO_CLAIMANT_ERROR_REPORT"
            }
            State::ClaimantErrorReportSent => "DELEGATED_CLAIMANT_ERROR_REPORT_SENT",

            State::PaymentStaged => "DELEGATED_PAYMENT_STAGED",
            State::PaymentValidated => "DELEGATED_PAYMENT_VALIDATED",
            State::PaymentAddToErrorReport => "DELEGATED_PAYMENT_ADD_TO_PAYMENT_ERROR_REPORT",
            State::PaymentErrorReportSent => "DELEGATED_PAYMENT_ERROR_REPORT_SENT",
            State::PaymentFailedWeeklyCapValidation => {
                "PAYMENT_FAILED_MAX_WEEKLY_BENEFIT_AMOUNT_VALIDATION"
            }
            State::PaymentAddToPubTransactionEft => {
                "DELEGATED_PAYMENT_ADD_TO_PUB_TRANSACTION_EFT"
            }
            State::PaymentAddToPubTransactionCheck => {
                "DELEGATED_PAYMENT_ADD_TO_PUB_TRANSACTION_CHECK"
            }
            State::PaymentPubTransactionEftSent => "DELEGATED_PAYMENT_PUB_TRANSACTION_EFT_SENT",
            State::PaymentPubTransactionCheckSent => {
                "DELEGATED_PAYMENT_PUB_TRANSACTION_CHECK_SENT"
            }
            State::PaymentComplete => "DELEGATED_PAYMENT_COMPLETE",

            State::AddToWriteback => "DELEGATED_ADD_TO_FINEOS_WRITEBACK",
            State::WritebackSent => "DELEGATED_FINEOS_WRITEBACK_SENT",
        }
    }

    /// Parse a state from its database key.
    pub fn from_db_str(value: &str) -> Option<State> {
        ALL_STATES.iter().copied().find(|s| s.as_db_str() == value)
    }

    /// Human-readable description, used in state counts and reports.
    pub fn description(&self) -> &'static str {
        match self {
            State::ClaimantStaged => "Claimant staged",
            State::ClaimantExtracted => "Claimant extracted",
            State::ClaimantAddToClaimantErrorReport => "Add to claimant error report",
            State::ClaimantErrorReportSent => "Claimant error report sent",

            State::PaymentStaged => "Payment staged",
            State::PaymentValidated => "Payment validated",
            State::PaymentAddToErrorReport => "Add to payment error report",
            State::PaymentErrorReportSent => "Payment error report sent",
            State::PaymentFailedWeeklyCapValidation => {
                "Payment failed max weekly benefit amount validation"
            }
            State::PaymentAddToPubTransactionEft => "Add to PUB transaction - EFT",
            State::PaymentAddToPubTransactionCheck => "Add to PUB transaction - check",
            State::PaymentPubTransactionEftSent => "PUB transaction sent - EFT",
            State::PaymentPubTransactionCheckSent => "PUB transaction sent - check",
            State::PaymentComplete => "Payment complete",

            State::AddToWriteback => "Add to FINEOS writeback",
            State::WritebackSent => "FINEOS writeback sent",
        }
    }
}

/// Every state, in declaration order.
pub const ALL_STATES: &[State] = &[
    State::ClaimantStaged,
    State::ClaimantExtracted,
    State::ClaimantAddToClaimantErrorReport,
    State::ClaimantErrorReportSent,
    State::PaymentStaged,
    State::PaymentValidated,
    State::PaymentAddToErrorReport,
    State::PaymentErrorReportSent,
    State::PaymentFailedWeeklyCapValidation,
    State::PaymentAddToPubTransactionEft,
    State::PaymentAddToPubTransactionCheck,
    State::PaymentPubTransactionEftSent,
    State::PaymentPubTransactionCheckSent,
    State::PaymentComplete,
    State::AddToWriteback,
    State::WritebackSent,
];

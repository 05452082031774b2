//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query
//! building, plus the DDL the pipeline owns. Timestamps are RFC 3339 text,
//! dates are ISO `YYYY-MM-DD` text, money is exact decimal text.

use sea_query::Iden;

/// State log table: append-only transition history.
#[derive(Iden)]
pub enum StateLogs {
    Table,
    #[iden = "state_log_id"]
    StateLogId,
    #[iden = "flow"]
    Flow,
    #[iden = "start_state"]
    StartState,
    #[iden = "end_state"]
    EndState,
    #[iden = "outcome"]
    Outcome,
    #[iden = "payment_id"]
    PaymentId,
    #[iden = "employee_id"]
    EmployeeId,
    #[iden = "reference_file_id"]
    ReferenceFileId,
    #[iden = "prev_state_log_id"]
    PrevStateLogId,
    #[iden = "import_log_id"]
    ImportLogId,
    #[iden = "created_at"]
    CreatedAt,
}

/// Denormalized head pointer per (entity, flow).
#[derive(Iden)]
pub enum LatestStateLogs {
    Table,
    #[iden = "latest_state_log_id"]
    LatestStateLogId,
    #[iden = "state_log_id"]
    StateLogId,
    #[iden = "flow"]
    Flow,
    #[iden = "payment_id"]
    PaymentId,
    #[iden = "employee_id"]
    EmployeeId,
    #[iden = "reference_file_id"]
    ReferenceFileId,
}

#[derive(Iden)]
pub enum ImportLogs {
    Table,
    #[iden = "import_log_id"]
    ImportLogId,
    #[iden = "source"]
    Source,
    #[iden = "status"]
    Status,
    #[iden = "report"]
    Report,
    #[iden = "start_at"]
    StartAt,
    #[iden = "end_at"]
    EndAt,
}

#[derive(Iden)]
pub enum Employees {
    Table,
    #[iden = "employee_id"]
    EmployeeId,
    #[iden = "tax_identifier"]
    TaxIdentifier,
    #[iden = "first_name"]
    FirstName,
    #[iden = "last_name"]
    LastName,
    #[iden = "routing_number"]
    RoutingNumber,
    #[iden = "account_number"]
    AccountNumber,
}

#[derive(Iden)]
pub enum Claims {
    Table,
    #[iden = "claim_id"]
    ClaimId,
    #[iden = "employee_id"]
    EmployeeId,
    #[iden = "absence_case_number"]
    AbsenceCaseNumber,
}

#[derive(Iden)]
pub enum AbsencePeriods {
    Table,
    #[iden = "absence_period_id"]
    AbsencePeriodId,
    #[iden = "claim_id"]
    ClaimId,
    #[iden = "class_id"]
    ClassId,
    #[iden = "index_id"]
    IndexId,
    #[iden = "start_date"]
    StartDate,
    #[iden = "end_date"]
    EndDate,
}

#[derive(Iden)]
pub enum Payments {
    Table,
    #[iden = "payment_id"]
    PaymentId,
    #[iden = "claim_id"]
    ClaimId,
    #[iden = "pei_c_value"]
    PeiCValue,
    #[iden = "pei_i_value"]
    PeiIValue,
    #[iden = "period_start_date"]
    PeriodStartDate,
    #[iden = "period_end_date"]
    PeriodEndDate,
    #[iden = "amount"]
    Amount,
    #[iden = "payment_method"]
    PaymentMethod,
    #[iden = "is_adhoc_payment"]
    IsAdhocPayment,
    #[iden = "payee_name"]
    PayeeName,
    #[iden = "routing_number"]
    RoutingNumber,
    #[iden = "account_number"]
    AccountNumber,
    #[iden = "check_number"]
    CheckNumber,
    #[iden = "import_log_id"]
    ImportLogId,
}

#[derive(Iden)]
pub enum ReferenceFiles {
    Table,
    #[iden = "reference_file_id"]
    ReferenceFileId,
    #[iden = "file_location"]
    FileLocation,
    #[iden = "reference_file_type"]
    ReferenceFileType,
    #[iden = "created_at"]
    CreatedAt,
}

/// Link table tying payments to the files that cover them.
#[derive(Iden)]
pub enum PaymentReferenceFiles {
    Table,
    #[iden = "payment_id"]
    PaymentId,
    #[iden = "reference_file_id"]
    ReferenceFileId,
}

#[derive(Iden)]
pub enum StagedClaimantRows {
    Table,
    #[iden = "staged_claimant_row_id"]
    StagedClaimantRowId,
    #[iden = "reference_file_id"]
    ReferenceFileId,
    #[iden = "import_log_id"]
    ImportLogId,
    #[iden = "absence_case_number"]
    AbsenceCaseNumber,
    #[iden = "absence_period_index"]
    AbsencePeriodIndex,
    #[iden = "tax_identifier"]
    TaxIdentifier,
    #[iden = "first_name"]
    FirstName,
    #[iden = "last_name"]
    LastName,
    #[iden = "absence_period_start"]
    AbsencePeriodStart,
    #[iden = "absence_period_end"]
    AbsencePeriodEnd,
    #[iden = "payment_method"]
    PaymentMethod,
    #[iden = "routing_number"]
    RoutingNumber,
    #[iden = "account_number"]
    AccountNumber,
}

#[derive(Iden)]
pub enum StagedPaymentRows {
    Table,
    #[iden = "staged_payment_row_id"]
    StagedPaymentRowId,
    #[iden = "reference_file_id"]
    ReferenceFileId,
    #[iden = "import_log_id"]
    ImportLogId,
    #[iden = "pei_c_value"]
    PeiCValue,
    #[iden = "pei_i_value"]
    PeiIValue,
    #[iden = "absence_case_number"]
    AbsenceCaseNumber,
    #[iden = "period_start"]
    PeriodStart,
    #[iden = "period_end"]
    PeriodEnd,
    #[iden = "amount"]
    Amount,
    #[iden = "payment_method"]
    PaymentMethod,
    #[iden = "is_adhoc"]
    IsAdhoc,
    #[iden = "payee_name"]
    PayeeName,
}

#[derive(Iden)]
pub enum AuditReportDetails {
    Table,
    #[iden = "audit_report_detail_id"]
    AuditReportDetailId,
    #[iden = "payment_id"]
    PaymentId,
    #[iden = "audit_report_type"]
    AuditReportType,
    #[iden = "details"]
    Details,
    #[iden = "import_log_id"]
    ImportLogId,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "added_to_audit_report_at"]
    AddedToAuditReportAt,
}

#[derive(Iden)]
pub enum WritebackDetails {
    Table,
    #[iden = "writeback_detail_id"]
    WritebackDetailId,
    #[iden = "payment_id"]
    PaymentId,
    #[iden = "transaction_status"]
    TransactionStatus,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "writeback_sent_at"]
    WritebackSentAt,
}

/// Report-inclusion queue: rows waiting to appear on a named report source.
#[derive(Iden)]
pub enum ReportQueue {
    Table,
    #[iden = "report_queue_id"]
    ReportQueueId,
    #[iden = "payment_id"]
    PaymentId,
    #[iden = "source"]
    Source,
    #[iden = "created_at"]
    CreatedAt,
}

pub const CREATE_STATE_LOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS state_logs (
    state_log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    flow TEXT NOT NULL,
    start_state TEXT,
    end_state TEXT,
    outcome TEXT,
    payment_id TEXT,
    employee_id TEXT,
    reference_file_id TEXT,
    prev_state_log_id INTEGER,
    import_log_id INTEGER,
    created_at TEXT NOT NULL,
    CHECK (
        (payment_id IS NOT NULL) + (employee_id IS NOT NULL)
            + (reference_file_id IS NOT NULL) <= 1
    )
);

CREATE INDEX IF NOT EXISTS idx_state_logs_end_state ON state_logs(end_state);
"#;

pub const CREATE_LATEST_STATE_LOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS latest_state_logs (
    latest_state_log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    state_log_id INTEGER NOT NULL,
    flow TEXT NOT NULL,
    payment_id TEXT,
    employee_id TEXT,
    reference_file_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_latest_state_logs_flow ON latest_state_logs(flow);
"#;

pub const CREATE_IMPORT_LOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS import_logs (
    import_log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    status TEXT NOT NULL,
    report TEXT,
    start_at TEXT NOT NULL,
    end_at TEXT
);
"#;

pub const CREATE_EMPLOYEES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS employees (
    employee_id TEXT PRIMARY KEY,
    tax_identifier TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    routing_number TEXT,
    account_number TEXT
);
"#;

pub const CREATE_CLAIMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS claims (
    claim_id TEXT PRIMARY KEY,
    employee_id TEXT NOT NULL,
    absence_case_number TEXT NOT NULL UNIQUE
);
"#;

pub const CREATE_ABSENCE_PERIODS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS absence_periods (
    absence_period_id TEXT PRIMARY KEY,
    claim_id TEXT NOT NULL,
    class_id INTEGER NOT NULL,
    index_id INTEGER NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    UNIQUE (claim_id, class_id, index_id)
);
"#;

pub const CREATE_PAYMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payments (
    payment_id TEXT PRIMARY KEY,
    claim_id TEXT,
    pei_c_value TEXT NOT NULL,
    pei_i_value TEXT NOT NULL,
    period_start_date TEXT NOT NULL,
    period_end_date TEXT NOT NULL,
    amount TEXT NOT NULL,
    payment_method TEXT NOT NULL,
    is_adhoc_payment INTEGER NOT NULL DEFAULT 0,
    payee_name TEXT,
    routing_number TEXT,
    account_number TEXT,
    check_number INTEGER,
    import_log_id INTEGER
);
"#;

pub const CREATE_REFERENCE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reference_files (
    reference_file_id TEXT PRIMARY KEY,
    file_location TEXT NOT NULL,
    reference_file_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

pub const CREATE_PAYMENT_REFERENCE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payment_reference_files (
    payment_id TEXT NOT NULL,
    reference_file_id TEXT NOT NULL,
    PRIMARY KEY (payment_id, reference_file_id)
);
"#;

pub const CREATE_STAGED_CLAIMANT_ROWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS staged_claimant_rows (
    staged_claimant_row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_file_id TEXT NOT NULL,
    import_log_id INTEGER,
    absence_case_number TEXT,
    absence_period_index TEXT,
    tax_identifier TEXT,
    first_name TEXT,
    last_name TEXT,
    absence_period_start TEXT,
    absence_period_end TEXT,
    payment_method TEXT,
    routing_number TEXT,
    account_number TEXT
);
"#;

pub const CREATE_STAGED_PAYMENT_ROWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS staged_payment_rows (
    staged_payment_row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_file_id TEXT NOT NULL,
    import_log_id INTEGER,
    pei_c_value TEXT,
    pei_i_value TEXT,
    absence_case_number TEXT,
    period_start TEXT,
    period_end TEXT,
    amount TEXT,
    payment_method TEXT,
    is_adhoc TEXT,
    payee_name TEXT
);
"#;

pub const CREATE_AUDIT_REPORT_DETAILS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS audit_report_details (
    audit_report_detail_id INTEGER PRIMARY KEY AUTOINCREMENT,
    payment_id TEXT NOT NULL,
    audit_report_type TEXT NOT NULL,
    details TEXT NOT NULL,
    import_log_id INTEGER,
    created_at TEXT NOT NULL,
    added_to_audit_report_at TEXT
);
"#;

pub const CREATE_WRITEBACK_DETAILS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS writeback_details (
    writeback_detail_id INTEGER PRIMARY KEY AUTOINCREMENT,
    payment_id TEXT NOT NULL,
    transaction_status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    writeback_sent_at TEXT
);
"#;

pub const CREATE_REPORT_QUEUE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS report_queue (
    report_queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
    payment_id TEXT,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// All DDL in creation order.
pub const CREATE_ALL: &[&str] = &[
    CREATE_STATE_LOGS_TABLE,
    CREATE_LATEST_STATE_LOGS_TABLE,
    CREATE_IMPORT_LOGS_TABLE,
    CREATE_EMPLOYEES_TABLE,
    CREATE_CLAIMS_TABLE,
    CREATE_ABSENCE_PERIODS_TABLE,
    CREATE_PAYMENTS_TABLE,
    CREATE_REFERENCE_FILES_TABLE,
    CREATE_PAYMENT_REFERENCE_FILES_TABLE,
    CREATE_STAGED_CLAIMANT_ROWS_TABLE,
    CREATE_STAGED_PAYMENT_ROWS_TABLE,
    CREATE_AUDIT_REPORT_DETAILS_TABLE,
    CREATE_WRITEBACK_DETAILS_TABLE,
    CREATE_REPORT_QUEUE_TABLE,
];

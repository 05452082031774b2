//! Pipeline entry point: runs the full step sequence once.
//!
//! Extracts are consumed from the received directory, payments move
//! through validation, audit and disbursement, and the outbound files
//! and reports land in the outbound directory. Each step commits
//! independently; the first fatal error halts the run with the completed
//! steps intact.

use tracing::info;
use tracing_subscriber::EnvFilter;

use leavepay::config::{PipelineConfig, LOG_ENV_VAR};
use leavepay::extract::{ClaimantExtractStep, PaymentExtractStep};
use leavepay::outbound::{
    CheckIssueStep, EftStep, ErrorReportKind, ErrorReportStep, WritebackStep,
};
use leavepay::pipeline::{run_steps, Step, StepRunner};
use leavepay::postprocess::{PaymentMethodSplitStep, PostProcessingStep};
use leavepay::report::ReportStep;
use leavepay::storage::Database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PipelineConfig::load()?;
    let db = Database::connect(&config.database_url).await?;
    let log_db = Database::connect(&config.log_database_url).await?;
    db.init_schema().await?;
    log_db.init_schema().await?;

    let mut steps: Vec<Box<dyn Step>> = vec![
        Box::new(ClaimantExtractStep::new(config.clone())),
        Box::new(PaymentExtractStep::new(config.clone())),
        Box::new(PostProcessingStep::new(&config)),
        Box::new(PaymentMethodSplitStep),
        Box::new(CheckIssueStep::new(config.clone())),
        Box::new(EftStep::new(config.clone())),
        Box::new(WritebackStep::new(config.clone())),
        Box::new(ErrorReportStep::new(ErrorReportKind::Claimant, config.clone())),
        Box::new(ErrorReportStep::new(ErrorReportKind::Payment, config.clone())),
        Box::new(ReportStep::new(config.clone())),
    ];

    let runner = StepRunner::new(db, log_db);
    run_steps(&runner, &mut steps).await?;
    info!("pipeline run complete");
    Ok(())
}

//! Filesystem side of reference-file handling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::model::ReferenceFile;
use crate::storage::reference_file_store;

use super::{Result, StepError};

/// Backoff for outbound file writes. Short and bounded: a share that is
/// still unavailable after a few seconds fails the step.
fn write_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
}

/// Write an outbound file, creating parent directories and retrying
/// transient I/O failures.
pub async fn write_outbound_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    (|| async { tokio::fs::write(path, contents).await })
        .retry(write_backoff())
        .notify(|err: &std::io::Error, dur: Duration| {
            warn!(path = %path.display(), error = %err, delay = ?dur, "file write failed, retrying");
        })
        .await?;
    info!(path = %path.display(), "wrote outbound file");
    Ok(())
}

/// Move a reference file's underlying file into `dest_dir` and update its
/// recorded location in the same breath. The database side runs on the
/// caller's connection so it commits or rolls back with the step; the
/// rename itself is not transactional, which is why the move happens
/// before the location update and never the other way around.
pub async fn move_reference_file(
    conn: &mut SqliteConnection,
    reference_file: &ReferenceFile,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let source = Path::new(&reference_file.file_location);
    let file_name = source.file_name().ok_or_else(|| {
        StepError::invariant(format!(
            "reference file {} has no file name in location {:?}",
            reference_file.reference_file_id, reference_file.file_location
        ))
    })?;
    let destination = dest_dir.join(file_name);

    tokio::fs::create_dir_all(dest_dir).await?;
    tokio::fs::rename(source, &destination).await?;
    reference_file_store::update_location(
        conn,
        reference_file.reference_file_id,
        &destination.to_string_lossy(),
    )
    .await?;

    info!(
        from = %source.display(),
        to = %destination.display(),
        "moved reference file"
    );
    Ok(destination)
}

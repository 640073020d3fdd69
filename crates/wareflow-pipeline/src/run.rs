//! The run loop: watermark read, pull, normalize, stage, copy, advance,
//! dedup

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use wareflow_core::{NormalizedBatch, TableSpec};
use wareflow_source::SourceAdapter;
use wareflow_staging::{stage_batch, StagingError, StagingStore};
use wareflow_transform::{normalize, NormalizeError};
use wareflow_warehouse::{WarehouseAdapter, WarehouseError};

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Normalization failed: {0}")]
    Normalization(#[from] NormalizeError),

    #[error("Staging failed: {0}")]
    StagingIo(#[from] StagingError),

    #[error("Warehouse operation failed: {0}")]
    WarehouseIo(#[from] WarehouseError),
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Raw records pulled from the source
    pub records_pulled: usize,

    /// Rows bulk-copied into the warehouse
    pub rows_loaded: usize,

    /// Watermark before the run
    pub watermark_before: Option<DateTime<Utc>>,

    /// Watermark after the run (unchanged for an empty batch)
    pub watermark_after: Option<DateTime<Utc>>,

    /// Key of the staged object, if the run staged one
    pub staged_key: Option<String>,

    /// Rows removed by the dedup pass
    pub duplicates_removed: u64,

    /// Whether the best-effort staged-object cleanup failed
    pub staged_cleanup_failed: bool,
}

/// One configured sync job
///
/// Holds the per-job constants; the adapters are passed per run so tests
/// and the CLI can wire mocks or real backends through the same path.
pub struct Pipeline {
    job_name: String,
    spec: TableSpec,
    tz: Tz,
    partition_prefix: String,
}

impl Pipeline {
    pub fn new(job_name: &str, spec: TableSpec, tz: Tz, partition_prefix: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            spec,
            tz,
            partition_prefix: partition_prefix.to_string(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Execute one run for `run_date`
    ///
    /// The watermark only advances after the bulk copy has committed, so
    /// a failure in between re-pulls the same window next run; the dedup
    /// pass absorbs the resulting double-loaded rows.
    pub async fn run(
        &self,
        source: &dyn SourceAdapter,
        staging: &dyn StagingStore,
        warehouse: &dyn WarehouseAdapter,
        run_date: NaiveDate,
    ) -> Result<RunOutcome, RunError> {
        // An unreachable metadata store means extraction cannot even
        // start, so it is classed with source failures.
        let watermark_before = warehouse
            .get_watermark(&self.job_name)
            .await
            .map_err(|e| RunError::SourceUnavailable(e.to_string()))?;
        info!(
            job = %self.job_name,
            watermark = ?watermark_before,
            "starting run"
        );

        let records = source
            .fetch_changed(watermark_before)
            .await
            .map_err(|e| RunError::SourceUnavailable(e.to_string()))?;
        info!(records = records.len(), "pulled changed records");

        let batch = normalize(&self.spec, &records, self.tz)?;

        if batch.is_empty() {
            info!(job = %self.job_name, "empty batch, nothing to load");
            return Ok(RunOutcome {
                records_pulled: records.len(),
                rows_loaded: 0,
                watermark_before,
                watermark_after: watermark_before,
                staged_key: None,
                duplicates_removed: 0,
                staged_cleanup_failed: false,
            });
        }

        let staged = stage_batch(staging, &self.spec, &batch, &self.partition_prefix, run_date)
            .await?;

        warehouse.copy_from_staging(&staged, &self.spec).await?;
        info!(rows = batch.len(), uri = %staged.uri(), "bulk copy committed");

        let watermark_after =
            self.advance_watermark(warehouse, watermark_before, &batch).await?;

        // The staged object is a scratch artifact; losing the delete only
        // leaves a file behind, so it must not fail the run.
        let staged_cleanup_failed = match staging.delete(&staged.key).await {
            Ok(()) => false,
            Err(e) => {
                warn!(key = %staged.key, error = %e, "staged-object cleanup failed");
                true
            }
        };

        let duplicates_removed = warehouse.delete_duplicates().await?;
        info!(
            job = %self.job_name,
            rows = batch.len(),
            duplicates_removed,
            "run complete"
        );

        Ok(RunOutcome {
            records_pulled: records.len(),
            rows_loaded: batch.len(),
            watermark_before,
            watermark_after,
            staged_key: Some(staged.key),
            duplicates_removed,
            staged_cleanup_failed,
        })
    }

    /// Advance the watermark to the batch maximum, never backwards
    async fn advance_watermark(
        &self,
        warehouse: &dyn WarehouseAdapter,
        current: Option<DateTime<Utc>>,
        batch: &NormalizedBatch,
    ) -> Result<Option<DateTime<Utc>>, RunError> {
        let candidate = match batch.max_updated_at {
            Some(candidate) => candidate,
            None => {
                // Rows without a usable updatedAt still load; they just
                // cannot move the watermark.
                warn!(job = %self.job_name, "batch has no usable updatedAt, watermark unchanged");
                return Ok(current);
            }
        };

        match current {
            Some(current) if candidate <= current => {
                info!(
                    job = %self.job_name,
                    current = %current,
                    candidate = %candidate,
                    "candidate watermark not newer, keeping current"
                );
                Ok(Some(current))
            }
            _ => {
                warehouse.set_watermark(&self.job_name, candidate).await?;
                info!(job = %self.job_name, watermark = %candidate, "watermark advanced");
                Ok(Some(candidate))
            }
        }
    }
}

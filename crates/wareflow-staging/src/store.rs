//! Staging store trait and the stage step

use chrono::NaiveDate;
use tracing::info;
use wareflow_core::{NormalizedBatch, StagedBatchRef, TableSpec};

use crate::encode::{encode_csv, staged_key};

/// Errors that can occur around the staging area
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Upload failed: {0}")]
    UploadError(String),

    #[error("Delete failed: {0}")]
    DeleteError(String),

    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Trait for object-store staging areas
#[async_trait::async_trait]
pub trait StagingStore: Send + Sync {
    /// Get the store name (e.g., "S3")
    fn name(&self) -> &'static str;

    /// The staging bucket this store writes into
    fn bucket(&self) -> &str;

    /// Write an object
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StagingError>;

    /// Delete an object
    async fn delete(&self, key: &str) -> Result<(), StagingError>;

    /// Test the connection to the object store
    async fn test_connection(&self) -> Result<(), StagingError>;
}

/// Materialize a normalized batch as a staged CSV object
///
/// Returns the reference the bulk copy consumes. The key is derived from
/// the run date (minus one day); re-staging the same partition overwrites
/// the previous object, which keeps re-runs idempotent at this step.
pub async fn stage_batch(
    store: &dyn StagingStore,
    spec: &TableSpec,
    batch: &NormalizedBatch,
    partition_prefix: &str,
    run_date: NaiveDate,
) -> Result<StagedBatchRef, StagingError> {
    let key = staged_key(partition_prefix, run_date);
    let bytes = encode_csv(spec, batch)?;

    info!(
        key = %key,
        rows = batch.len(),
        bytes = bytes.len(),
        "staging batch"
    );

    store.put(&key, bytes).await?;

    Ok(StagedBatchRef {
        bucket: store.bucket().to_string(),
        key,
    })
}

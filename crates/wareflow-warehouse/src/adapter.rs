//! Warehouse adapter trait

use chrono::{DateTime, Utc};
use wareflow_core::{StagedBatchRef, TableSpec};

/// Errors that can occur against the warehouse
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Metadata access failed: {0}")]
    MetadataError(String),

    #[error("Bulk copy failed: {0}")]
    CopyError(String),

    #[error("Dedup failed: {0}")]
    DedupError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Trait for warehouse adapters
///
/// The copy is append-only: it never updates or deletes existing target
/// rows. Dedup is the correctness backstop for at-least-once extraction
/// and insertion, and must be idempotent.
#[async_trait::async_trait]
pub trait WarehouseAdapter: Send + Sync {
    /// Get the adapter name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Read the watermark for a job; `None` means no prior watermark
    /// exists (first run)
    async fn get_watermark(&self, job_name: &str)
        -> Result<Option<DateTime<Utc>>, WarehouseError>;

    /// Overwrite the watermark for a job
    async fn set_watermark(
        &self,
        job_name: &str,
        watermark: DateTime<Utc>,
    ) -> Result<(), WarehouseError>;

    /// Bulk-copy a staged batch into the target table (append-only)
    async fn copy_from_staging(
        &self,
        staged: &StagedBatchRef,
        spec: &TableSpec,
    ) -> Result<(), WarehouseError>;

    /// Remove duplicate target rows: per identifier, retain exactly the
    /// row with the maximum `updatedAt`. Returns the number of rows
    /// removed.
    async fn delete_duplicates(&self) -> Result<u64, WarehouseError>;

    /// Test the connection to the warehouse
    async fn test_connection(&self) -> Result<(), WarehouseError>;
}

//! Source adapter trait for pulling changed records

use chrono::{DateTime, Utc};
use wareflow_core::RawRecord;

/// Errors that can occur when pulling from the document store
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Trait for document-store adapters that pull changed records
///
/// Failure is non-retryable locally; it is surfaced to the caller, and
/// retry policy belongs to the external scheduler.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Get the adapter name (e.g., "MongoDB")
    fn name(&self) -> &'static str;

    /// Pull all records modified at or after `since`
    ///
    /// `None` means no prior watermark exists: the first run pulls the
    /// entire source. An empty result set is a valid empty batch, not an
    /// error.
    async fn fetch_changed(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawRecord>, SourceError>;

    /// Test the connection to the document store
    async fn test_connection(&self) -> Result<(), SourceError>;
}

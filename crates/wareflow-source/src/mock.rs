//! Mock source adapter for testing
//!
//! Stores documents in memory together with their last-modified instants
//! and answers range pulls without a real document store. Useful for unit
//! and integration testing the pipeline, and for simulating source
//! outages.
//!
//! ```rust,ignore
//! let source = MockSource::new();
//! source.add_record(updated_at, json!({ "_id": "A1", ... })).await;
//! let records = source.fetch_changed(None).await?;
//! ```

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use wareflow_core::RawRecord;

use crate::adapter::{SourceAdapter, SourceError};

/// Mock document-store adapter
pub struct MockSource {
    /// Stored documents with their last-modified instants
    records: Arc<RwLock<Vec<(DateTime<Utc>, RawRecord)>>>,

    /// Simulate an unreachable source
    fail_connection: Arc<AtomicBool>,
}

impl MockSource {
    /// Create an empty mock source
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            fail_connection: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add a document with its last-modified instant
    pub async fn add_record(&self, updated_at: DateTime<Utc>, record: RawRecord) {
        self.records.write().await.push((updated_at, record));
    }

    /// Toggle simulated source outage
    pub fn fail_connection(&self, fail: bool) {
        self.fail_connection.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.fail_connection.load(Ordering::SeqCst) {
            return Err(SourceError::ConnectionError(
                "simulated source outage".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for MockSource {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn fetch_changed(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        self.check_available()?;

        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|(updated_at, _)| since.map_or(true, |s| *updated_at >= s))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn test_connection(&self) -> Result<(), SourceError> {
        self.check_available()
    }
}

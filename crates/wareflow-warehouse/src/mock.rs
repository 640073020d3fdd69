//! Mock warehouse adapter for testing
//!
//! Keeps watermarks and target rows in memory. When attached to a shared
//! object map (the mock staging store exposes one), its bulk copy reads
//! the staged CSV the way the real copy reads from the object store, so
//! pipeline tests exercise the full stage/copy/dedup path without
//! credentials.
//!
//! ```rust,ignore
//! let staging = MockStaging::new("etl-staging");
//! let warehouse = MockWarehouse::new().with_object_store(staging.objects());
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use wareflow_core::{StagedBatchRef, TableSpec};

use crate::adapter::{WarehouseAdapter, WarehouseError};

/// Shared in-memory object map: key -> bytes (same shape the mock
/// staging store exposes)
pub type ObjectMap = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// One row as persisted by the mock target table
///
/// `updated_at` keeps the rendered wall-clock form, which sorts
/// lexicographically in timestamp order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Identifier column value
    pub id: String,

    /// Rendered `updatedAt` value
    pub updated_at: String,

    /// All column values in declared order
    pub fields: Vec<String>,
}

/// Mock warehouse adapter
pub struct MockWarehouse {
    /// Watermarks by job name
    watermarks: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,

    /// Target table rows (append-only until dedup)
    rows: Arc<RwLock<Vec<StoredRow>>>,

    /// Staged objects readable by the bulk copy
    objects: Option<ObjectMap>,

    /// Simulate metadata-store outage
    fail_metadata: Arc<AtomicBool>,

    /// Simulate bulk-copy failure
    fail_copy: Arc<AtomicBool>,

    /// Simulate watermark-write failure
    fail_watermark_write: Arc<AtomicBool>,
}

impl MockWarehouse {
    /// Create an empty mock warehouse
    pub fn new() -> Self {
        Self {
            watermarks: Arc::new(RwLock::new(HashMap::new())),
            rows: Arc::new(RwLock::new(Vec::new())),
            objects: None,
            fail_metadata: Arc::new(AtomicBool::new(false)),
            fail_copy: Arc::new(AtomicBool::new(false)),
            fail_watermark_write: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach the object map the bulk copy reads staged CSVs from
    pub fn with_object_store(mut self, objects: ObjectMap) -> Self {
        self.objects = Some(objects);
        self
    }

    /// Pre-seed a watermark
    pub async fn seed_watermark(&self, job_name: &str, watermark: DateTime<Utc>) {
        self.watermarks
            .write()
            .await
            .insert(job_name.to_string(), watermark);
    }

    /// Toggle simulated metadata outage
    pub fn fail_metadata(&self, fail: bool) {
        self.fail_metadata.store(fail, Ordering::SeqCst);
    }

    /// Toggle simulated bulk-copy failure
    pub fn fail_copy(&self, fail: bool) {
        self.fail_copy.store(fail, Ordering::SeqCst);
    }

    /// Toggle simulated watermark-write failure
    pub fn fail_watermark_write(&self, fail: bool) {
        self.fail_watermark_write.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the target table rows
    pub async fn rows(&self) -> Vec<StoredRow> {
        self.rows.read().await.clone()
    }

    /// Rows currently stored for an identifier
    pub async fn rows_for(&self, id: &str) -> Vec<StoredRow> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|r| r.id == id)
            .cloned()
            .collect()
    }
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WarehouseAdapter for MockWarehouse {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn get_watermark(
        &self,
        job_name: &str,
    ) -> Result<Option<DateTime<Utc>>, WarehouseError> {
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(WarehouseError::MetadataError(
                "simulated metadata outage".to_string(),
            ));
        }
        Ok(self.watermarks.read().await.get(job_name).copied())
    }

    async fn set_watermark(
        &self,
        job_name: &str,
        watermark: DateTime<Utc>,
    ) -> Result<(), WarehouseError> {
        if self.fail_metadata.load(Ordering::SeqCst)
            || self.fail_watermark_write.load(Ordering::SeqCst)
        {
            return Err(WarehouseError::MetadataError(
                "simulated watermark-write failure".to_string(),
            ));
        }
        self.watermarks
            .write()
            .await
            .insert(job_name.to_string(), watermark);
        Ok(())
    }

    async fn copy_from_staging(
        &self,
        staged: &StagedBatchRef,
        spec: &TableSpec,
    ) -> Result<(), WarehouseError> {
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(WarehouseError::CopyError(
                "simulated bulk-copy failure".to_string(),
            ));
        }

        let objects = self.objects.as_ref().ok_or_else(|| {
            WarehouseError::ConfigError("no object store attached".to_string())
        })?;

        let bytes = objects
            .read()
            .await
            .get(&staged.key)
            .cloned()
            .ok_or_else(|| {
                WarehouseError::CopyError(format!("staged object not found: {}", staged.uri()))
            })?;

        let id_idx = column_index(spec, "id")?;
        let updated_idx = column_index(spec, "updatedAt")?;

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let mut rows = self.rows.write().await;
        for record in reader.records() {
            let record =
                record.map_err(|e| WarehouseError::CopyError(format!("bad CSV: {}", e)))?;
            let fields: Vec<String> = record.iter().map(str::to_string).collect();
            if fields.len() != spec.columns.len() {
                return Err(WarehouseError::CopyError(format!(
                    "row has {} fields, expected {}",
                    fields.len(),
                    spec.columns.len()
                )));
            }
            rows.push(StoredRow {
                id: fields[id_idx].clone(),
                updated_at: fields[updated_idx].clone(),
                fields,
            });
        }

        Ok(())
    }

    async fn delete_duplicates(&self) -> Result<u64, WarehouseError> {
        let mut rows = self.rows.write().await;

        // Index of the first row carrying the max updated_at per id
        let mut keep: HashMap<String, usize> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            match keep.get(&row.id) {
                Some(&best) if rows[best].updated_at >= row.updated_at => {}
                _ => {
                    keep.insert(row.id.clone(), idx);
                }
            }
        }

        let before = rows.len();
        let kept: Vec<usize> = keep.into_values().collect();
        let mut idx = 0;
        rows.retain(|_| {
            let keep_this = kept.contains(&idx);
            idx += 1;
            keep_this
        });

        Ok((before - rows.len()) as u64)
    }

    async fn test_connection(&self) -> Result<(), WarehouseError> {
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(WarehouseError::MetadataError(
                "simulated warehouse outage".to_string(),
            ));
        }
        Ok(())
    }
}

fn column_index(spec: &TableSpec, name: &str) -> Result<usize, WarehouseError> {
    spec.columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| WarehouseError::ConfigError(format!("no '{}' column declared", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wareflow_core::delivery_attempts;

    fn stored(id: &str, updated_at: &str) -> StoredRow {
        StoredRow {
            id: id.to_string(),
            updated_at: updated_at.to_string(),
            fields: vec![id.to_string(), updated_at.to_string()],
        }
    }

    #[tokio::test]
    async fn watermark_roundtrip() {
        let warehouse = MockWarehouse::new();
        assert_eq!(warehouse.get_watermark("job").await.unwrap(), None);

        let t = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        warehouse.set_watermark("job", t).await.unwrap();
        assert_eq!(warehouse.get_watermark("job").await.unwrap(), Some(t));
    }

    #[tokio::test]
    async fn dedup_retains_max_updated_at() {
        let warehouse = MockWarehouse::new();
        {
            let mut rows = warehouse.rows.write().await;
            rows.push(stored("A1", "2024-01-01 10:00:00"));
            rows.push(stored("A1", "2024-01-02 10:00:00"));
            rows.push(stored("A2", "2024-01-01 09:00:00"));
        }

        let removed = warehouse.delete_duplicates().await.unwrap();
        assert_eq!(removed, 1);

        let a1 = warehouse.rows_for("A1").await;
        assert_eq!(a1.len(), 1);
        assert_eq!(a1[0].updated_at, "2024-01-02 10:00:00");
        assert_eq!(warehouse.rows_for("A2").await.len(), 1);
    }

    #[tokio::test]
    async fn dedup_collapses_exact_ties() {
        let warehouse = MockWarehouse::new();
        {
            let mut rows = warehouse.rows.write().await;
            rows.push(stored("A1", "2024-01-02 10:00:00"));
            rows.push(stored("A1", "2024-01-02 10:00:00"));
        }

        let removed = warehouse.delete_duplicates().await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(warehouse.rows_for("A1").await.len(), 1);
    }

    #[tokio::test]
    async fn dedup_is_idempotent() {
        let warehouse = MockWarehouse::new();
        {
            let mut rows = warehouse.rows.write().await;
            rows.push(stored("A1", "2024-01-01 10:00:00"));
            rows.push(stored("A1", "2024-01-02 10:00:00"));
        }

        warehouse.delete_duplicates().await.unwrap();
        let after_first = warehouse.rows().await;

        let removed = warehouse.delete_duplicates().await.unwrap();
        assert_eq!(removed, 0);
        assert_eq!(warehouse.rows().await, after_first);
    }

    #[tokio::test]
    async fn copy_requires_attached_object_store() {
        let warehouse = MockWarehouse::new();
        let spec = delivery_attempts();
        let staged = StagedBatchRef {
            bucket: "b".to_string(),
            key: "k".to_string(),
        };
        assert!(matches!(
            warehouse.copy_from_staging(&staged, &spec).await,
            Err(WarehouseError::ConfigError(_))
        ));
    }
}

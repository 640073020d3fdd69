//! Mock staging store for testing
//!
//! Holds staged objects in a shared in-memory map. The map handle can be
//! cloned out and given to a mock warehouse so its bulk copy can read the
//! staged CSV the way the real copy reads from the object store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{StagingStore, StagingError};

/// Shared in-memory object map: key -> bytes
pub type ObjectMap = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// Mock object-store staging area
pub struct MockStaging {
    /// Bucket name reported to staged-batch refs
    bucket: String,

    /// Stored objects
    objects: ObjectMap,

    /// Simulate upload failure
    fail_put: Arc<AtomicBool>,

    /// Simulate delete failure (cleanup is best effort)
    fail_delete: Arc<AtomicBool>,
}

impl MockStaging {
    /// Create an empty mock store
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            fail_put: Arc::new(AtomicBool::new(false)),
            fail_delete: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle to the shared object map
    pub fn objects(&self) -> ObjectMap {
        Arc::clone(&self.objects)
    }

    /// Toggle simulated upload failure
    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    /// Toggle simulated delete failure
    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Number of objects currently staged
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Read a staged object back
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }
}

#[async_trait::async_trait]
impl StagingStore for MockStaging {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StagingError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StagingError::UploadError(
                "simulated upload failure".to_string(),
            ));
        }
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StagingError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StagingError::DeleteError(
                "simulated delete failure".to_string(),
            ));
        }
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), StagingError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StagingError::ConnectionError(
                "simulated store outage".to_string(),
            ));
        }
        Ok(())
    }
}

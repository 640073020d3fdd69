//! End-to-end run tests over the mock source, staging store, and
//! warehouse

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Africa::Cairo;
use pretty_assertions::assert_eq;
use serde_json::json;

use wareflow_core::delivery_attempts;
use wareflow_pipeline::{Pipeline, RunError, RunOutcome};
use wareflow_source::MockSource;
use wareflow_staging::MockStaging;
use wareflow_warehouse::{MockWarehouse, WarehouseAdapter};

fn pipeline() -> Pipeline {
    Pipeline::new("deliveryAttempts", delivery_attempts(), Cairo, "delivery_attempts/")
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
}

fn instant(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn attempt(id: &str, updated_at: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "deliveryId": format!("D-{}", id),
        "trackingNumber": 7001,
        "createdAt": "2024-01-01T08:00:00Z",
        "updatedAt": updated_at,
        "state": 3,
        "type": "FIRST",
        "consignee": { "name": "  Amr Hassan " },
    })
}

async fn seed(source: &MockSource, id: &str, updated_at: &str) {
    source.add_record(instant(updated_at), attempt(id, updated_at)).await;
}

struct Harness {
    source: MockSource,
    staging: MockStaging,
    warehouse: MockWarehouse,
}

impl Harness {
    fn new() -> Self {
        let staging = MockStaging::new("etl-staging");
        let warehouse = MockWarehouse::new().with_object_store(staging.objects());
        Self {
            source: MockSource::new(),
            staging,
            warehouse,
        }
    }

    async fn run(&self, pipeline: &Pipeline) -> Result<RunOutcome, RunError> {
        pipeline
            .run(&self.source, &self.staging, &self.warehouse, run_date())
            .await
    }
}

#[tokio::test]
async fn first_run_loads_everything_and_sets_watermark() {
    let harness = Harness::new();
    seed(&harness.source, "A1", "2024-01-02T10:00:00Z").await;
    seed(&harness.source, "A2", "2024-01-02T11:30:00Z").await;

    let pipeline = pipeline();
    let outcome = harness.run(&pipeline).await.unwrap();

    assert_eq!(outcome.records_pulled, 2);
    assert_eq!(outcome.rows_loaded, 2);
    assert_eq!(outcome.watermark_before, None);
    assert_eq!(outcome.watermark_after, Some(instant("2024-01-02T11:30:00Z")));
    assert_eq!(outcome.duplicates_removed, 0);
    assert!(!outcome.staged_cleanup_failed);

    assert_eq!(harness.warehouse.rows().await.len(), 2);
    assert_eq!(
        harness.warehouse.get_watermark("deliveryAttempts").await.unwrap(),
        Some(instant("2024-01-02T11:30:00Z"))
    );
    // staged object cleaned up after the copy
    assert_eq!(harness.staging.object_count().await, 0);
}

#[tokio::test]
async fn empty_batch_skips_load_and_keeps_watermark() {
    let harness = Harness::new();
    let watermark = instant("2024-01-02T10:00:00Z");
    harness.warehouse.seed_watermark("deliveryAttempts", watermark).await;

    let pipeline = pipeline();
    let outcome = harness.run(&pipeline).await.unwrap();

    assert_eq!(outcome.records_pulled, 0);
    assert_eq!(outcome.rows_loaded, 0);
    assert_eq!(outcome.staged_key, None);
    assert_eq!(outcome.watermark_after, Some(watermark));
    assert_eq!(harness.staging.object_count().await, 0);
    assert!(harness.warehouse.rows().await.is_empty());
}

#[tokio::test]
async fn boundary_record_repulled_but_converges_to_one_row() {
    let harness = Harness::new();
    seed(&harness.source, "A1", "2024-01-02T10:00:00Z").await;

    let pipeline = pipeline();
    harness.run(&pipeline).await.unwrap();

    // The watermark equals A1's updatedAt, so the next run pulls A1
    // again (inclusive bound) and loads it a second time.
    let outcome = harness.run(&pipeline).await.unwrap();
    assert_eq!(outcome.records_pulled, 1);
    assert_eq!(outcome.rows_loaded, 1);
    assert_eq!(outcome.duplicates_removed, 1);

    assert_eq!(harness.warehouse.rows_for("A1").await.len(), 1);
    assert_eq!(outcome.watermark_after, Some(instant("2024-01-02T10:00:00Z")));
}

#[tokio::test]
async fn newer_version_replaces_older_row() {
    let harness = Harness::new();
    seed(&harness.source, "A1", "2024-01-02T10:00:00Z").await;

    let pipeline = pipeline();
    harness.run(&pipeline).await.unwrap();

    seed(&harness.source, "A1", "2024-01-03T09:00:00Z").await;
    harness.run(&pipeline).await.unwrap();

    let rows = harness.warehouse.rows_for("A1").await;
    assert_eq!(rows.len(), 1);
    // rendered in Africa/Cairo (UTC+2 in January)
    assert_eq!(rows[0].updated_at, "2024-01-03 11:00:00");
}

#[tokio::test]
async fn watermark_never_moves_backwards() {
    let harness = Harness::new();
    let ahead = instant("2024-06-01T00:00:00Z");
    harness.warehouse.seed_watermark("deliveryAttempts", ahead).await;
    // Record sits exactly at the watermark, so the inclusive pull
    // returns it without offering a newer candidate.
    seed(&harness.source, "A1", "2024-06-01T00:00:00Z").await;

    let pipeline = pipeline();
    let outcome = harness.run(&pipeline).await.unwrap();

    assert_eq!(outcome.rows_loaded, 1);
    assert_eq!(outcome.watermark_after, Some(ahead));
    assert_eq!(
        harness.warehouse.get_watermark("deliveryAttempts").await.unwrap(),
        Some(ahead)
    );
}

#[tokio::test]
async fn cleanup_failure_does_not_fail_the_run() {
    let harness = Harness::new();
    seed(&harness.source, "A1", "2024-01-02T10:00:00Z").await;
    harness.staging.fail_delete(true);

    let pipeline = pipeline();
    let outcome = harness.run(&pipeline).await.unwrap();

    assert_eq!(outcome.rows_loaded, 1);
    assert!(outcome.staged_cleanup_failed);
    assert_eq!(outcome.watermark_after, Some(instant("2024-01-02T10:00:00Z")));
    // the orphaned object is still there
    assert_eq!(harness.staging.object_count().await, 1);
}

#[tokio::test]
async fn copy_failure_leaves_watermark_untouched() {
    let harness = Harness::new();
    seed(&harness.source, "A1", "2024-01-02T10:00:00Z").await;
    harness.warehouse.fail_copy(true);

    let pipeline = pipeline();
    let err = harness.run(&pipeline).await.unwrap_err();
    assert!(matches!(err, RunError::WarehouseIo(_)));

    assert_eq!(
        harness.warehouse.get_watermark("deliveryAttempts").await.unwrap(),
        None
    );
    assert!(harness.warehouse.rows().await.is_empty());
}

#[tokio::test]
async fn crash_between_copy_and_advance_is_repaired_by_rerun() {
    let harness = Harness::new();
    seed(&harness.source, "A1", "2024-01-02T10:00:00Z").await;
    harness.warehouse.fail_watermark_write(true);

    let pipeline = pipeline();
    let err = harness.run(&pipeline).await.unwrap_err();
    assert!(matches!(err, RunError::WarehouseIo(_)));

    // Rows landed but the watermark did not move.
    assert_eq!(harness.warehouse.rows_for("A1").await.len(), 1);
    assert_eq!(
        harness.warehouse.get_watermark("deliveryAttempts").await.unwrap(),
        None
    );

    // The rerun re-pulls the same window and dedup collapses the
    // double-loaded row.
    harness.warehouse.fail_watermark_write(false);
    let outcome = harness.run(&pipeline).await.unwrap();

    assert_eq!(harness.warehouse.rows_for("A1").await.len(), 1);
    assert_eq!(outcome.watermark_after, Some(instant("2024-01-02T10:00:00Z")));
}

#[tokio::test]
async fn unreachable_source_aborts_before_any_write() {
    let harness = Harness::new();
    harness.source.fail_connection(true);

    let pipeline = pipeline();
    let err = harness.run(&pipeline).await.unwrap_err();
    assert!(matches!(err, RunError::SourceUnavailable(_)));

    assert_eq!(harness.staging.object_count().await, 0);
    assert!(harness.warehouse.rows().await.is_empty());
}

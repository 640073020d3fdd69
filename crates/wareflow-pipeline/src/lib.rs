//! Incremental extract-normalize-load run orchestration
//!
//! One run is a single pass of the delivery-attempt sync: pull every
//! source record at or after the stored watermark, normalize the batch,
//! stage it as CSV, bulk-copy it into the warehouse, advance the
//! watermark, and collapse duplicates. Every step is idempotent or
//! dedup-repaired, so a crash at any point is fixed by re-running.

pub mod run;

pub use run::{Pipeline, RunError, RunOutcome};

//! Staged-batch handling
//!
//! Normalized rows are materialized as a CSV object in durable object
//! storage before the warehouse bulk copy. The object key is
//! `<partition-prefix><run date minus one day, ISO 8601>.csv`: UTF-8,
//! comma-delimited, header row present, one line per normalized row,
//! columns in declared warehouse order.
//!
//! ## Features
//!
//! - `s3` - Amazon S3 / S3-compatible staging store
//!
//! Without the feature the store constructor returns a configuration
//! error at runtime, so callers compile the same either way.

pub mod encode;
pub mod mock;
pub mod s3;
pub mod store;

pub use encode::{encode_csv, staged_key};
pub use mock::MockStaging;
pub use s3::S3Staging;
pub use store::{stage_batch, StagingError, StagingStore};

//! Document-store adapters for the watermark extractor
//!
//! This crate provides adapters that pull raw delivery-attempt documents
//! modified at or after a watermark. The range bound is inclusive on
//! purpose: the record updated exactly at the prior watermark is re-pulled
//! on every subsequent run, and the loader's dedup pass is what makes that
//! safe.
//!
//! ## Features
//!
//! Enable document-store support via Cargo features:
//! - `mongodb` - MongoDB support
//!
//! Without the feature the adapter constructors return a configuration
//! error at runtime, so callers compile the same either way.

pub mod adapter;
pub mod mock;
pub mod mongo;

pub use adapter::{SourceAdapter, SourceError};
pub use mock::MockSource;
pub use mongo::MongoSource;

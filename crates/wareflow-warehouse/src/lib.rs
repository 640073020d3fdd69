//! Warehouse adapters for the idempotent loader
//!
//! A warehouse adapter owns three responsibilities of the load side:
//! the per-job watermark row in the metadata table, the append-only bulk
//! copy from the staging area, and the dedup pass that retains exactly
//! one row per identifier (the one with the maximum `updatedAt`).
//!
//! ## Features
//!
//! - `postgres` - PostgreSQL / Redshift-compatible warehouses over
//!   tokio-postgres (plain or TLS)
//!
//! Without the feature the adapter constructors return a configuration
//! error at runtime, so callers compile the same either way.

pub mod adapter;
pub mod mock;
pub mod postgres;

pub use adapter::{WarehouseAdapter, WarehouseError};
pub use mock::{MockWarehouse, ObjectMap, StoredRow};
pub use postgres::PostgresWarehouse;

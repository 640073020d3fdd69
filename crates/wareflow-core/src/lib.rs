//! Wareflow Core
//!
//! Core domain model: the fixed target-table declaration, the normalized
//! row/value model, and run configuration. The target schema is static;
//! column names and order are part of the warehouse contract and must not
//! be reordered or renamed.

pub mod config;
pub mod row;
pub mod table;

pub use config::{Config, ConfigError, SourceConfig, StagingConfig, WarehouseConfig};
pub use row::{CellValue, NormalizedBatch, NormalizedRow, RawRecord, StagedBatchRef};
pub use table::{delivery_attempts, ColumnSpec, ColumnType, TableSpec};

//! Wareflow Transform
//!
//! The normalization engine: a pure function from raw source documents to
//! typed warehouse rows. No I/O, no state across calls — the only inputs
//! besides the documents are the static table spec and the deployment
//! timezone.
//!
//! The engine applies a fixed stage order; later stages assume earlier
//! ones' guarantees:
//!
//! 1. Flatten nested documents into dotted-path keys
//! 2. Select the declared source paths
//! 3. Clean keys into valid warehouse identifiers
//! 4. Rename to target column names
//! 5. Pre-fill designated boolean columns with `false`
//! 6. Coerce every declared column to its type (defaulting absentees)
//! 7. Normalize timestamps into the deployment timezone
//! 8. Replace null-like string sentinels with the empty string
//! 9. Truncate length-limited string columns
//! 10. Reconcile lenient verification flags to real booleans

pub mod coerce;
pub mod flatten;
pub mod normalize;

pub use flatten::flatten;
pub use normalize::{normalize, NormalizeError};

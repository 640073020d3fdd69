//! Row and cell value model
//!
//! A [`RawRecord`] is the untyped document pulled from the source. A
//! [`NormalizedRow`] is its projection onto the target table: one typed
//! cell per declared column, in declared order. Timestamp cells carry an
//! explicit no-value state; unparseable instants never abort a row.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::table::{ColumnType, TableSpec};

/// An arbitrarily nested document pulled from the source system
///
/// The pipeline only reads raw records; source adapters are responsible
/// for converting driver-native scalars (object ids, datetimes) into
/// plain JSON before handing documents over.
pub type RawRecord = serde_json::Value;

/// One typed cell of a normalized row
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// String cell; never holds a null-like sentinel token
    Str(String),

    /// 64-bit integer cell
    Int(i64),

    /// Boolean cell; never null
    Bool(bool),

    /// Timestamp cell in the deployment timezone; `None` is "no value"
    Timestamp(Option<DateTime<Tz>>),
}

impl CellValue {
    /// The declared type this cell satisfies
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Str(_) => ColumnType::String,
            Self::Int(_) => ColumnType::Int,
            Self::Bool(_) => ColumnType::Bool,
            Self::Timestamp(_) => ColumnType::Timestamp,
        }
    }

    /// Render the cell for the staged CSV
    ///
    /// Timestamps use the warehouse wall-clock format; a no-value
    /// timestamp renders as the empty field.
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Timestamp(Some(ts)) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Timestamp(None) => String::new(),
        }
    }
}

/// A normalized row: one cell per declared target column, in order
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// Cells in the declared column order of the table spec
    pub cells: Vec<CellValue>,
}

impl NormalizedRow {
    /// Look up a cell by target column name
    pub fn cell<'a>(&'a self, spec: &TableSpec, name: &str) -> Option<&'a CellValue> {
        let idx = spec.columns.iter().position(|c| c.name == name)?;
        self.cells.get(idx)
    }
}

/// A batch of normalized rows plus the candidate next watermark
///
/// `max_updated_at` is the maximum source last-modified instant seen in
/// the batch, or `None` for an empty batch — the signal that the watermark
/// must not be advanced.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch {
    /// Normalized rows ready for staging
    pub rows: Vec<NormalizedRow>,

    /// Candidate next watermark
    pub max_updated_at: Option<DateTime<Utc>>,
}

impl NormalizedBatch {
    /// Create an empty batch (no rows, no candidate watermark)
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            max_updated_at: None,
        }
    }

    /// Number of rows in the batch
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reference to a staged batch in the object store
///
/// Produced by the staging step, consumed exactly once by the bulk copy,
/// then deleted (best effort).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBatchRef {
    /// Staging bucket name
    pub bucket: String,

    /// Object key of the staged CSV
    pub key: String,
}

impl StagedBatchRef {
    /// The object URI the bulk-copy statement reads from
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Africa::Cairo;

    #[test]
    fn cell_render_formats() {
        assert_eq!(CellValue::Str("abc".into()).render(), "abc");
        assert_eq!(CellValue::Int(42).render(), "42");
        assert_eq!(CellValue::Bool(false).render(), "false");
        assert_eq!(CellValue::Timestamp(None).render(), "");

        let ts = Cairo.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        assert_eq!(
            CellValue::Timestamp(Some(ts)).render(),
            "2024-01-02 12:00:00"
        );
    }

    #[test]
    fn row_cell_lookup_by_name() {
        let spec = crate::table::delivery_attempts();
        let mut cells = Vec::new();
        for col in &spec.columns {
            cells.push(match col.column_type {
                ColumnType::String => CellValue::Str(String::new()),
                ColumnType::Int => CellValue::Int(0),
                ColumnType::Bool => CellValue::Bool(false),
                ColumnType::Timestamp => CellValue::Timestamp(None),
            });
        }
        let row = NormalizedRow { cells };

        assert_eq!(
            row.cell(&spec, "trackingNumber"),
            Some(&CellValue::Int(0))
        );
        assert_eq!(row.cell(&spec, "missing"), None);
    }

    #[test]
    fn empty_batch_has_no_candidate_watermark() {
        let batch = NormalizedBatch::empty();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert_eq!(batch.max_updated_at, None);
    }
}

//! CSV encoding of normalized batches

use chrono::NaiveDate;
use wareflow_core::{NormalizedBatch, TableSpec};

use crate::store::StagingError;

/// Encode a normalized batch as the staged CSV
///
/// Header row carries the target column names in declared order; every
/// data row renders its cells with [`wareflow_core::CellValue::render`].
pub fn encode_csv(spec: &TableSpec, batch: &NormalizedBatch) -> Result<Vec<u8>, StagingError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(spec.column_names())
        .map_err(|e| StagingError::EncodeError(e.to_string()))?;

    for row in &batch.rows {
        let record: Vec<String> = row.cells.iter().map(|cell| cell.render()).collect();
        writer
            .write_record(&record)
            .map_err(|e| StagingError::EncodeError(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| StagingError::EncodeError(e.to_string()))
}

/// Object key for a run's staged batch
///
/// Batches are keyed by the data partition date: the run date minus one
/// day, ISO 8601.
pub fn staged_key(partition_prefix: &str, run_date: NaiveDate) -> String {
    let partition_date = run_date - chrono::Duration::days(1);
    format!("{}{}.csv", partition_prefix, partition_date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wareflow_core::{delivery_attempts, CellValue, ColumnType, NormalizedRow};

    fn default_row(spec: &TableSpec) -> NormalizedRow {
        NormalizedRow {
            cells: spec
                .columns
                .iter()
                .map(|col| match col.column_type {
                    ColumnType::String => CellValue::Str(String::new()),
                    ColumnType::Int => CellValue::Int(0),
                    ColumnType::Bool => CellValue::Bool(false),
                    ColumnType::Timestamp => CellValue::Timestamp(None),
                })
                .collect(),
        }
    }

    #[test]
    fn header_matches_declared_order() {
        let spec = delivery_attempts();
        let batch = NormalizedBatch {
            rows: vec![],
            max_updated_at: None,
        };

        let bytes = encode_csv(&spec, &batch).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("id,delivery_id,trackingNumber,"));
        assert!(header.ends_with("exception_conversationStatus_time,consignee_rescheduleDate"));
    }

    #[test]
    fn one_line_per_row() {
        let spec = delivery_attempts();
        let batch = NormalizedBatch {
            rows: vec![default_row(&spec), default_row(&spec)],
            max_updated_at: None,
        };

        let bytes = encode_csv(&spec, &batch).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn staged_key_uses_previous_day() {
        let run_date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(
            staged_key("delivery_attempts/", run_date),
            "delivery_attempts/2024-01-02.csv"
        );
        assert_eq!(staged_key("", run_date), "2024-01-02.csv");
    }
}

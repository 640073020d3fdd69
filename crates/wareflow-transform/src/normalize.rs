//! Normalization pipeline
//!
//! Projects flattened documents onto the declared target column set and
//! coerces every column to its declared type. A type mismatch in the
//! source is a batch-level data-quality incident: the whole batch fails
//! with [`NormalizeError`] rather than skipping rows, because silently
//! dropped rows would corrupt the completeness guarantee tied to the
//! watermark.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use wareflow_core::{
    CellValue, ColumnSpec, ColumnType, NormalizedBatch, NormalizedRow, RawRecord, TableSpec,
};

use crate::coerce::{coerce_bool, coerce_int, coerce_string, parse_instant};
use crate::flatten::flatten;

/// Separator used when flattening nested key paths
pub const PATH_SEPARATOR: &str = ".";

/// Literal tokens treated as null in string columns
const NULL_TOKENS: &[&str] = &["nan", "NAN", "NaN", "NaT"];

/// Errors produced by the normalization engine
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("column '{column}': cannot coerce {value} to {expected}")]
    Coerce {
        column: String,
        value: String,
        expected: ColumnType,
    },
}

/// Normalize a batch of raw records into warehouse rows
///
/// Pure function of its inputs. Returns the rows together with the
/// candidate next watermark: the maximum `updatedAt` instant seen in the
/// batch, or `None` for an empty batch (callers must not overwrite a real
/// watermark with "no value").
pub fn normalize(
    spec: &TableSpec,
    records: &[RawRecord],
    tz: Tz,
) -> Result<NormalizedBatch, NormalizeError> {
    info!(records = records.len(), "normalizing batch");

    let mut rows = Vec::with_capacity(records.len());
    let mut max_updated_at: Option<DateTime<Utc>> = None;

    for record in records {
        let flat = flatten(record, PATH_SEPARATOR);
        let selected = select(spec, flat);
        let cleaned = clean_keys(selected);
        let renamed = rename(spec, cleaned);
        let prefilled = prefill_booleans(spec, renamed);
        let row = coerce_row(spec, &prefilled, tz)?;

        if let Some(CellValue::Timestamp(Some(ts))) = row.cell(spec, "updatedAt") {
            let instant = ts.with_timezone(&Utc);
            max_updated_at = Some(max_updated_at.map_or(instant, |m| m.max(instant)));
        }

        rows.push(row);
    }

    debug!(
        rows = rows.len(),
        candidate_watermark = ?max_updated_at,
        "batch normalized"
    );

    Ok(NormalizedBatch {
        rows,
        max_updated_at,
    })
}

/// Project onto the declared source paths; absent paths are dropped here,
/// not defaulted
fn select(spec: &TableSpec, mut flat: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    flat.retain(|key, _| spec.source_paths.iter().any(|p| p == key));
    flat
}

/// Replace structural separators with underscores and collapse runs, so
/// every key is a valid warehouse identifier
fn clean_keys(map: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    map.into_iter()
        .map(|(key, value)| (clean_key(&key), value))
        .collect()
}

fn clean_key(key: &str) -> String {
    let replaced = key.replace(PATH_SEPARATOR, "_");
    let mut out = String::with_capacity(replaced.len());
    let mut last_underscore = false;
    for ch in replaced.chars() {
        if ch == '_' {
            if !last_underscore {
                out.push(ch);
            }
            last_underscore = true;
        } else {
            out.push(ch);
            last_underscore = false;
        }
    }
    out
}

/// Apply the fixed source-name -> target-name map
fn rename(spec: &TableSpec, map: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    map.into_iter()
        .map(|(key, value)| (spec.rename(&key).to_string(), value))
        .collect()
}

/// Default designated boolean columns to `false` when missing or null,
/// ahead of type coercion
fn prefill_booleans(spec: &TableSpec, mut map: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    for col in spec.columns.iter().filter(|c| c.prefill_false) {
        let entry = map.entry(col.name.clone()).or_insert(Value::Bool(false));
        if entry.is_null() {
            *entry = Value::Bool(false);
        }
    }
    map
}

/// Coerce one projected document onto the full declared column set
///
/// Every declared column comes out present and typed; columns absent from
/// the document get a neutral default first. Leftover keys that no
/// declared column claims (for example index-suffixed array paths) are
/// dropped.
fn coerce_row(
    spec: &TableSpec,
    map: &BTreeMap<String, Value>,
    tz: Tz,
) -> Result<NormalizedRow, NormalizeError> {
    let mut cells = Vec::with_capacity(spec.columns.len());
    for col in &spec.columns {
        let value = map.get(&col.name).unwrap_or(&Value::Null);
        cells.push(coerce_cell(col, value, tz)?);
    }
    Ok(NormalizedRow { cells })
}

fn coerce_cell(col: &ColumnSpec, value: &Value, tz: Tz) -> Result<CellValue, NormalizeError> {
    match col.column_type {
        ColumnType::String => {
            let s = coerce_string(value).ok_or_else(|| coerce_error(col, value))?;
            Ok(CellValue::Str(finish_string(col, s)))
        }
        ColumnType::Int => {
            let i = coerce_int(value).ok_or_else(|| coerce_error(col, value))?;
            Ok(CellValue::Int(i))
        }
        ColumnType::Bool => match coerce_bool(value) {
            Some(b) => Ok(CellValue::Bool(b)),
            // Lenient flags reconcile uncoercible values (the literal
            // "nan" included) to false instead of failing the batch.
            None if col.lenient_bool => Ok(CellValue::Bool(false)),
            None => Err(coerce_error(col, value)),
        },
        ColumnType::Timestamp => {
            let instant = parse_instant(value);
            Ok(CellValue::Timestamp(
                instant.map(|dt| dt.with_timezone(&tz)),
            ))
        }
    }
}

/// Sanitize, trim, and truncate a coerced string per the column spec
fn finish_string(col: &ColumnSpec, s: String) -> String {
    if NULL_TOKENS.contains(&s.as_str()) {
        return String::new();
    }

    let s = if col.trim { s.trim().to_string() } else { s };

    match col.max_chars {
        Some(max) if s.chars().count() > max => s.chars().take(max).collect(),
        _ => s,
    }
}

fn coerce_error(col: &ColumnSpec, value: &Value) -> NormalizeError {
    let mut rendered = value.to_string();
    if rendered.len() > 80 {
        rendered.truncate(80);
        rendered.push_str("...");
    }
    NormalizeError::Coerce {
        column: col.name.clone(),
        value: rendered,
        expected: col.column_type,
    }
}

//! Scalar type coercion
//!
//! One function per target type. Each returns `None` when the value
//! cannot be coerced; the caller decides whether that is fatal for the
//! batch or falls back to a default.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Coerce a JSON scalar to a string cell value
///
/// Null becomes the empty string (the neutral default injected for absent
/// columns). Containers do not coerce.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Coerce a JSON scalar to a 64-bit integer
///
/// Missing and NaN-like values are replaced with zero before coercion, so
/// null and the empty string map to 0 here. Fractional inputs truncate.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Null => Some(0),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(0);
            }
            if let Ok(i) = s.parse::<i64>() {
                return Some(i);
            }
            s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64)
        }
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Coerce a JSON scalar to a boolean
///
/// Null and the empty string default to `false`; `"true"`/`"false"` parse
/// case-insensitively; 0/1 numbers map to their truth value. Anything
/// else does not coerce.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Null => Some(false),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Some(false),
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Parse a timestamp value as an absolute instant
///
/// Accepts RFC 3339, `%Y-%m-%d %H:%M:%S` (with optional fractional
/// seconds), the `T`-separated naive variant, and bare dates. Naive
/// values are interpreted as UTC. Anything unparseable yields `None` —
/// an explicit "no value", never a row failure.
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    let s = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_coercion() {
        assert_eq!(coerce_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(coerce_string(&json!(null)), Some(String::new()));
        assert_eq!(coerce_string(&json!(true)), Some("true".to_string()));
        assert_eq!(coerce_string(&json!(7)), Some("7".to_string()));
        assert_eq!(coerce_string(&json!({"a": 1})), None);
        assert_eq!(coerce_string(&json!([1])), None);
    }

    #[test]
    fn int_coercion() {
        assert_eq!(coerce_int(&json!(42)), Some(42));
        assert_eq!(coerce_int(&json!(42.9)), Some(42));
        assert_eq!(coerce_int(&json!("42")), Some(42));
        assert_eq!(coerce_int(&json!("")), Some(0));
        assert_eq!(coerce_int(&json!(null)), Some(0));
        assert_eq!(coerce_int(&json!("not a number")), None);
    }

    #[test]
    fn bool_coercion() {
        assert_eq!(coerce_bool(&json!(true)), Some(true));
        assert_eq!(coerce_bool(&json!("True")), Some(true));
        assert_eq!(coerce_bool(&json!("false")), Some(false));
        assert_eq!(coerce_bool(&json!("")), Some(false));
        assert_eq!(coerce_bool(&json!(null)), Some(false));
        assert_eq!(coerce_bool(&json!(1)), Some(true));
        assert_eq!(coerce_bool(&json!(0)), Some(false));
        assert_eq!(coerce_bool(&json!("nan")), None);
        assert_eq!(coerce_bool(&json!(2)), None);
    }

    #[test]
    fn instant_parsing() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        assert_eq!(parse_instant(&json!("2024-01-02T10:00:00Z")), Some(expected));
        assert_eq!(parse_instant(&json!("2024-01-02 10:00:00")), Some(expected));
        assert_eq!(parse_instant(&json!("2024-01-02T10:00:00")), Some(expected));
        assert_eq!(
            parse_instant(&json!("2024-01-02T12:00:00+02:00")),
            Some(expected)
        );

        let midnight = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_instant(&json!("2024-01-02")), Some(midnight));
    }

    #[test]
    fn unparseable_instants_are_none() {
        assert_eq!(parse_instant(&json!("yesterday")), None);
        assert_eq!(parse_instant(&json!("")), None);
        assert_eq!(parse_instant(&json!(null)), None);
        assert_eq!(parse_instant(&json!(true)), None);
    }
}

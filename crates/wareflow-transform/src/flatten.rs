//! Document flattening
//!
//! Converts a nested document into a single-level mapping by joining key
//! paths with a separator. The policy is deterministic:
//!
//! - nested object fields join with the separator (`a.b.c`)
//! - array elements flatten under index-suffixed keys (`a.0.b`); the
//!   declared source-column list never names indexed paths, so arrays are
//!   dropped at the Select stage
//! - empty objects and arrays produce no key
//! - `null` leaves keep their key with a JSON null
//!
//! Absent branches are simply missing keys, never null-valued ones.

use serde_json::Value;
use std::collections::BTreeMap;

/// Flatten a document into dotted-path keys
///
/// Non-object roots flatten to nothing; a raw record is always a
/// document.
pub fn flatten(record: &Value, separator: &str) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if let Value::Object(map) = record {
        for (key, value) in map {
            flatten_into(&mut out, key.clone(), value, separator);
        }
    }
    out
}

fn flatten_into(out: &mut BTreeMap<String, Value>, prefix: String, value: &Value, separator: &str) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(out, format!("{prefix}{separator}{key}"), child, separator);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(out, format!("{prefix}{separator}{index}"), child, separator);
            }
        }
        Value::Object(_) | Value::Array(_) => {}
        leaf => {
            out.insert(prefix, leaf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn flattens_nested_objects() {
        let doc = json!({
            "_id": "A1",
            "business": { "_id": "B1", "name": "Acme" },
            "exception": { "whatsAppVerification": { "verified": true } }
        });

        let flat = flatten(&doc, ".");
        assert_eq!(flat.get("_id"), Some(&json!("A1")));
        assert_eq!(flat.get("business._id"), Some(&json!("B1")));
        assert_eq!(flat.get("business.name"), Some(&json!("Acme")));
        assert_eq!(
            flat.get("exception.whatsAppVerification.verified"),
            Some(&json!(true))
        );
    }

    #[test]
    fn arrays_get_index_suffixed_keys() {
        let doc = json!({ "tags": ["a", "b"], "items": [{ "sku": 1 }] });

        let flat = flatten(&doc, ".");
        assert_eq!(flat.get("tags.0"), Some(&json!("a")));
        assert_eq!(flat.get("tags.1"), Some(&json!("b")));
        assert_eq!(flat.get("items.0.sku"), Some(&json!(1)));
        assert!(!flat.contains_key("tags"));
    }

    #[test]
    fn absent_branches_are_missing_not_null() {
        let doc = json!({ "_id": "A1" });
        let flat = flatten(&doc, ".");
        assert!(!flat.contains_key("exception.time"));
    }

    #[test]
    fn null_leaves_keep_their_key() {
        let doc = json!({ "routeId": null });
        let flat = flatten(&doc, ".");
        assert_eq!(flat.get("routeId"), Some(&Value::Null));
    }

    #[test]
    fn empty_containers_drop() {
        let doc = json!({ "exception": {}, "tags": [] });
        let flat = flatten(&doc, ".");
        assert!(flat.is_empty());
    }

    #[test]
    fn non_object_root_flattens_to_nothing() {
        assert!(flatten(&json!("scalar"), ".").is_empty());
        assert!(flatten(&json!(null), ".").is_empty());
    }
}

//! Canonical attribute forms
//!
//! Two attribute maps are considered equal when their canonical strings
//! match: bookkeeping removed, object keys sorted recursively, no
//! insignificant whitespace. Field order never produces a difference.

use crate::entity::{strip_bookkeeping, Attributes};
use serde_json::Value;
use std::fmt::Write;

/// Canonical string form of a JSON value
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json's string escaping is already deterministic
    out.push_str(&Value::String(s.to_string()).to_string());
}

/// Canonical form of the semantic part of an attribute map
#[must_use]
pub fn canonical_attributes(attributes: &Attributes) -> String {
    let semantic = strip_bookkeeping(attributes);
    let object: serde_json::Map<String, Value> = semantic.into_iter().collect();
    canonical_string(&Value::Object(object))
}

/// Whether two attribute maps carry the same semantic content
#[must_use]
pub fn semantically_equal(a: &Attributes, b: &Attributes) -> bool {
    canonical_attributes(a) == canonical_attributes(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CREATED_AT, LAST_MODIFIED_BY};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn nested_keys_are_sorted() {
        let value = json!({"b": {"y": 1, "x": [2, {"d": 0, "c": 1}]}, "a": "s"});
        assert_eq!(
            canonical_string(&value),
            r#"{"a":"s","b":{"x":[2,{"c":1,"d":0}],"y":1}}"#
        );
    }

    #[test]
    fn bookkeeping_is_ignored() {
        let mut a = Attributes::new();
        a.insert("name".into(), json!("Payments"));
        let mut b = a.clone();
        b.insert(CREATED_AT.into(), json!("2024-01-01T00:00:00Z"));
        b.insert(LAST_MODIFIED_BY.into(), json!("bob"));
        assert!(semantically_equal(&a, &b));
    }

    #[test]
    fn value_changes_are_detected() {
        let mut a = Attributes::new();
        a.insert("tier".into(), json!(1));
        let mut b = Attributes::new();
        b.insert("tier".into(), json!("1"));
        assert!(!semantically_equal(&a, &b));
    }

    proptest! {
        #[test]
        fn prop_insertion_order_never_matters(
            entries in proptest::collection::vec(("[a-z]{1,6}", any::<i64>()), 0..12)
        ) {
            let forward: serde_json::Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let backward: serde_json::Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            // Later duplicates win in `forward`, earlier ones in `backward`;
            // compare only when the key set is duplicate-free.
            let unique: std::collections::HashSet<_> = entries.iter().map(|(k, _)| k).collect();
            prop_assume!(unique.len() == entries.len());
            prop_assert_eq!(
                canonical_string(&Value::Object(forward)),
                canonical_string(&Value::Object(backward))
            );
        }
    }
}

//! Property normalization and group validation.
//!
//! Every ingestion path runs caller-supplied maps through these helpers
//! before an event is built. Sanitization never fails: oversized values are
//! truncated and unacceptable entries dropped, each with a logged warning,
//! so one bad property can never abort ingestion of the rest of the event.

use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::{MAX_PROPERTY_KEYS, MAX_STRING_LENGTH};

/// Truncate a string to [`MAX_STRING_LENGTH`], respecting char boundaries.
fn truncate_string(s: &str) -> String {
    if s.len() <= MAX_STRING_LENGTH {
        return s.to_string();
    }
    let mut end = MAX_STRING_LENGTH;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Recursively truncate every string inside a JSON value.
fn truncate_value(value: Value) -> Value {
    match value {
        Value::String(s) => {
            if s.len() > MAX_STRING_LENGTH {
                warn!(len = s.len(), "property string truncated");
            }
            Value::String(truncate_string(&s))
        }
        Value::Array(items) => Value::Array(items.into_iter().map(truncate_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (truncate_string(&k), truncate_value(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Normalize a caller-supplied property map.
///
/// Caps the key count at [`MAX_PROPERTY_KEYS`] (extra keys dropped, logged)
/// and truncates every string key and value to [`MAX_STRING_LENGTH`].
pub fn sanitize_properties(props: Map<String, Value>) -> Map<String, Value> {
    let total = props.len();
    if total > MAX_PROPERTY_KEYS {
        warn!(
            total,
            max = MAX_PROPERTY_KEYS,
            "property map over key limit, extra keys dropped"
        );
    }
    props
        .into_iter()
        .take(MAX_PROPERTY_KEYS)
        .map(|(k, v)| (truncate_string(&k), truncate_value(v)))
        .collect()
}

/// Validate a groups map: values must be a string or an array of strings.
///
/// Entries of any other shape are dropped with a warning. Surviving values
/// go through the normal string truncation.
pub fn validate_groups(groups: Map<String, Value>) -> Map<String, Value> {
    groups
        .into_iter()
        .filter_map(|(group_type, value)| {
            let ok = match &value {
                Value::String(_) => true,
                Value::Array(items) => items.iter().all(Value::is_string),
                _ => false,
            };
            if ok {
                Some((truncate_string(&group_type), truncate_value(value)))
            } else {
                warn!(
                    group_type = %group_type,
                    "group value must be a string or array of strings, dropped"
                );
                None
            }
        })
        .collect()
}

/// Validate an event type: must be non-empty after trimming.
pub fn valid_event_type(event_type: &str) -> bool {
    !event_type.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn long_strings_truncated() {
        let long = "x".repeat(MAX_STRING_LENGTH + 100);
        let out = sanitize_properties(map(json!({ "k": long })));
        assert_eq!(out["k"].as_str().unwrap().len(), MAX_STRING_LENGTH);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // A multi-byte char straddling the limit must not split.
        let s = format!("{}é", "a".repeat(MAX_STRING_LENGTH - 1));
        let out = sanitize_properties(map(json!({ "k": s })));
        let truncated = out["k"].as_str().unwrap();
        assert!(truncated.len() <= MAX_STRING_LENGTH);
        assert!(truncated.is_char_boundary(truncated.len()));
    }

    #[test]
    fn nested_values_truncated() {
        let long = "y".repeat(MAX_STRING_LENGTH * 2);
        let out = sanitize_properties(map(json!({
            "arr": [long.clone()],
            "obj": { "inner": long },
        })));
        assert_eq!(
            out["arr"][0].as_str().unwrap().len(),
            MAX_STRING_LENGTH
        );
        assert_eq!(
            out["obj"]["inner"].as_str().unwrap().len(),
            MAX_STRING_LENGTH
        );
    }

    #[test]
    fn key_count_capped() {
        let mut props = Map::new();
        for i in 0..(MAX_PROPERTY_KEYS + 10) {
            let _ = props.insert(format!("k{i}"), json!(1));
        }
        let out = sanitize_properties(props);
        assert_eq!(out.len(), MAX_PROPERTY_KEYS);
    }

    #[test]
    fn non_string_values_pass_through() {
        let out = sanitize_properties(map(json!({
            "n": 3.5, "b": true, "null": null, "i": 7,
        })));
        assert_eq!(out["n"], json!(3.5));
        assert_eq!(out["b"], json!(true));
        assert_eq!(out["null"], json!(null));
        assert_eq!(out["i"], json!(7));
    }

    #[test]
    fn groups_accept_string_and_string_array() {
        let out = validate_groups(map(json!({
            "team": "backend",
            "orgs": ["a", "b"],
        })));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn groups_reject_other_shapes() {
        let out = validate_groups(map(json!({
            "bad_num": 3,
            "bad_mixed": ["a", 1],
            "bad_obj": {"x": 1},
            "ok": "fine",
        })));
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("ok"));
    }

    #[test]
    fn event_type_must_be_non_empty() {
        assert!(valid_event_type("click"));
        assert!(!valid_event_type(""));
        assert!(!valid_event_type("   "));
    }
}

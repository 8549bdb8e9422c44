//! Stable request fingerprint for idempotency.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Input fields that vary between otherwise identical retries.
pub const EXCLUDED_FIELDS: [&str; 3] = ["confirm", "idempotencyKey", "requestId"];

/// Length of the truncated hex digest.
pub const REQUEST_HASH_LEN: usize = 32;

/// Digest of `{tool, input}` with the retry-varying fields removed and object
/// keys sorted at every depth.
pub fn compute_request_hash(tool_name: &str, input: &Value) -> String {
    let mut input = input.clone();
    if let Value::Object(map) = &mut input {
        for field in EXCLUDED_FIELDS {
            map.remove(field);
        }
    }

    let payload = canonicalize(&json!({ "tool": tool_name, "input": input }));
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(REQUEST_HASH_LEN);
    digest
}

/// Rebuild `value` with object keys inserted in sorted order, so the
/// serialization does not depend on construction order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_fixed_length_hex() {
        let h = compute_request_hash("adjust_inventory", &json!({"delta": 1}));
        assert_eq!(h.len(), REQUEST_HASH_LEN);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_stable_under_key_reordering() {
        let mut a = Map::new();
        a.insert("a".into(), json!(1));
        a.insert("b".into(), json!(2));
        let mut b = Map::new();
        b.insert("b".into(), json!(2));
        b.insert("a".into(), json!(1));

        assert_eq!(
            compute_request_hash("t", &Value::Object(a)),
            compute_request_hash("t", &Value::Object(b))
        );
    }

    #[test]
    fn nested_objects_are_canonicalized() {
        let a = json!({"actor": {"name": "n", "role": "r"}, "x": [ {"p": 1, "q": 2} ]});
        let b = json!({"x": [ {"q": 2, "p": 1} ], "actor": {"role": "r", "name": "n"}});
        assert_eq!(compute_request_hash("t", &a), compute_request_hash("t", &b));
    }

    #[test]
    fn control_fields_do_not_affect_hash() {
        let base = json!({"itemId": "i-1", "delta": 2.0, "reason": "recount"});
        let with_controls = json!({
            "itemId": "i-1",
            "delta": 2.0,
            "reason": "recount",
            "confirm": true,
            "idempotencyKey": "key-9",
            "requestId": "corr-1"
        });
        let other_controls = json!({
            "itemId": "i-1",
            "delta": 2.0,
            "reason": "recount",
            "confirm": false,
            "idempotencyKey": "key-10",
            "requestId": "corr-2"
        });
        let h = compute_request_hash("adjust_inventory", &base);
        assert_eq!(h, compute_request_hash("adjust_inventory", &with_controls));
        assert_eq!(h, compute_request_hash("adjust_inventory", &other_controls));
    }

    #[test]
    fn business_fields_change_hash() {
        let a = json!({"itemId": "i-1", "delta": 2.0});
        let b = json!({"itemId": "i-1", "delta": 3.0});
        assert_ne!(compute_request_hash("t", &a), compute_request_hash("t", &b));
    }

    #[test]
    fn tool_name_is_part_of_hash() {
        let input = json!({"job": "sales"});
        assert_ne!(
            compute_request_hash("trigger_etl", &input),
            compute_request_hash("adjust_inventory", &input)
        );
    }
}

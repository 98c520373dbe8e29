//! Depth-first searches over an arbitrary JSON tree.

use serde_json::Value;

/// Every value stored under `key`, at any depth, in document discovery order.
///
/// A matching value is yielded before anything nested inside it.
pub fn find_key<'a>(root: &'a Value, key: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    visit(root, &mut |k, v| {
        if k == key {
            found.push(v);
        }
        true
    });
    found
}

/// First object stored under `key` at any depth.
pub fn find_object<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut found = None;
    visit(root, &mut |k, v| {
        if k == key && v.is_object() {
            found = Some(v);
            return false;
        }
        true
    });
    found
}

/// Walk every `(key, value)` pair of every object. Returns `false` once `f` asks to stop.
fn visit<'a, F>(value: &'a Value, f: &mut F) -> bool
where
    F: FnMut(&str, &'a Value) -> bool,
{
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if !f(k, v) || !visit(v, f) {
                    return false;
                }
            }
            true
        }
        Value::Array(items) => items.iter().all(|item| visit(item, f)),
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => true,
    }
}

/// First non-null value among alternative key spellings.
pub fn first_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| is_populated(v))
}

/// Mirrors JSON "truthiness": empty strings, arrays and objects count as missing.
pub fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

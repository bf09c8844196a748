//! Primary key helpers shared by the cache, records and reconciliation.

use serde_json::{Map, Value};

/// Render a primary key value the way it appears in paths and cache keys.
///
/// Strings are used verbatim, everything else in its JSON form
/// (`1` stays `1`, `"alice"` becomes `alice`).
pub fn render_key(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Value of the first candidate field that is present and non-null.
pub fn primary_key_of(attributes: &Map<String, Value>, candidates: &[String]) -> Option<Value> {
  candidates
    .iter()
    .filter_map(|name| attributes.get(name))
    .find(|value| !value.is_null())
    .cloned()
}

/// Attribute equality as used for dirty checks and key matching: numbers
/// compare by value (`1 == 1.0`), arrays element-wise.
pub fn values_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
      (Some(l), Some(r)) => l == r,
      _ => left == right,
    },
    (Value::Array(left), Value::Array(right)) => {
      left.len() == right.len() && left.iter().zip(right).all(|(l, r)| values_equal(l, r))
    }
    _ => a == b,
  }
}

/// Two attribute sets refer to the same entity if any one candidate field
/// holds the same non-null value on both sides.
pub fn keys_match(candidates: &[String], a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
  candidates.iter().any(|name| match (a.get(name), b.get(name)) {
    (Some(left), Some(right)) => !left.is_null() && values_equal(left, right),
    _ => false,
  })
}

//! The logging interface a [`DecoratedError`](crate::DecoratedError) reports
//! to. Implementations adapt it to a concrete backend.

use serde_json::{Map, Value};

/// A structured log field.
pub type Field<'a> = (&'a str, Value);

/// Minimal structured logger.
pub trait Logger: Send + Sync {
    fn error(&self, msg: &str, fields: &[Field<'_>]);
    fn debug(&self, msg: &str, fields: &[Field<'_>]);
    fn info(&self, msg: &str, fields: &[Field<'_>]);
}

/// Pair up an alternating `key, value, key, value, ...` slice.
///
/// A trailing key without a value is dropped, as is any pair whose key is
/// not a string.
pub fn fields_from_flat(kv: &[Value]) -> Vec<Field<'_>> {
    kv.chunks_exact(2)
        .filter_map(|pair| Some((pair[0].as_str()?, pair[1].clone())))
        .collect()
}

/// Collect fields into a JSON object. Later duplicates win.
pub fn fields_to_json(fields: &[Field<'_>]) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_pairs() {
        let kv = [json!("a"), json!(1), json!("b"), json!("x")];
        let fields = fields_from_flat(&kv);
        assert_eq!(fields, vec![("a", json!(1)), ("b", json!("x"))]);
    }

    #[test]
    fn odd_length_drops_trailing_key() {
        let kv = [json!("a"), json!(1), json!("dangling")];
        let fields = fields_from_flat(&kv);
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn non_string_keys_are_skipped() {
        let kv = [json!(7), json!(1), json!("ok"), json!(2)];
        assert_eq!(fields_from_flat(&kv), vec![("ok", json!(2))]);
    }

    #[test]
    fn fields_render_as_object() {
        let v = fields_to_json(&[("k", json!("v")), ("n", json!(3))]);
        assert_eq!(v, json!({"k": "v", "n": 3}));
    }
}

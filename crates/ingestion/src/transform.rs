//! Field value normalization
//!
//! Athena returns every cell as text, so array columns arrive as
//! `"[\"a\", \"b\"]"`. These helpers turn such values back into JSON arrays.

use contracts::Record;
use serde_json::Value;

/// Parse a string that looks like a JSON array.
///
/// Returns `None` when the text is not bracketed or does not parse as an
/// array; the caller keeps the original string in that case.
pub fn decode_encoded_array(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Array(_)) => Some(value),
        _ => None,
    }
}

/// Replace every string field holding an encoded array with the array itself
pub fn expand_encoded_arrays(record: Record) -> Record {
    let fields = record
        .into_fields()
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => decode_encoded_array(&text).unwrap_or(Value::String(text)),
                other => other,
            };
            (name, value)
        })
        .collect();
    Record::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_array() {
        assert_eq!(
            decode_encoded_array(r#" ["a", "b"] "#),
            Some(json!(["a", "b"]))
        );
        assert_eq!(decode_encoded_array("[1, 2"), None);
        assert_eq!(decode_encoded_array("[not json]"), None);
        assert_eq!(decode_encoded_array("plain"), None);
    }

    #[test]
    fn test_expand_leaves_other_fields() {
        let record = Record::from_pairs([
            ("orgno", json!("123456789")),
            ("tags", json!("[\"x\",\"y\"]")),
            ("broken", json!("[x")),
            ("count", json!(3)),
        ]);

        let expanded = expand_encoded_arrays(record);
        assert_eq!(expanded.get("orgno"), Some(&json!("123456789")));
        assert_eq!(expanded.get("tags"), Some(&json!(["x", "y"])));
        assert_eq!(expanded.get("broken"), Some(&json!("[x")));
        assert_eq!(expanded.get("count"), Some(&json!(3)));
    }
}

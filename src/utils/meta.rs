use serde_json::{Map, Value};

/// Combine the pieces of a record's metadata. Entry fields win over the
/// store's default metadata, which wins over the label.
pub fn merge_meta(
    default_meta: &Map<String, Value>,
    label: &str,
    fields: &Map<String, Value>,
) -> Map<String, Value> {
    let mut meta = Map::new();

    if !label.is_empty() {
        meta.insert("label".to_string(), Value::String(label.to_string()));
    }

    for (key, value) in default_meta {
        meta.insert(key.clone(), value.clone());
    }

    for (key, value) in fields {
        meta.insert(key.clone(), value.clone());
    }

    meta
}

/// Serialize metadata for the `meta` column. Always yields valid JSON text.
pub fn encode_meta(meta: &Map<String, Value>) -> String {
    serde_json::to_string(meta).unwrap_or_else(|_| "{}".to_string())
}

/// Parse a stored `meta` column. Text that is not JSON (written by some other
/// tool) comes back as a plain string; NULL comes back as an empty object.
pub fn decode_meta(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Object(Map::new()),
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A log entry handed to the sink by the logging front-end.
///
/// `level` and `message` become columns; every other field is folded into
/// the record's metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogEntry {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        LogEntry {
            level: level.into(),
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Attach a metadata field. Values that fail to serialize are stored as a
    /// placeholder string so a log write never fails on its metadata.
    pub fn with_field<T: Serialize + ?Sized>(mut self, key: impl Into<String>, value: &T) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|err| Value::String(format!("[unserializable: {}]", err)));
        self.fields.insert(key.into(), value);
        self
    }
}

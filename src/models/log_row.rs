use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A stored log record as returned by a query.
///
/// Only the projected columns are `Some`; absent columns are left out when
/// the row is serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LogRow {
    /// Columns carrying a value, in table order.
    pub fn present_columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        if self.id.is_some() {
            columns.push(Column::Id);
        }
        if self.level.is_some() {
            columns.push(Column::Level);
        }
        if self.message.is_some() {
            columns.push(Column::Message);
        }
        if self.meta.is_some() {
            columns.push(Column::Meta);
        }
        if self.timestamp.is_some() {
            columns.push(Column::Timestamp);
        }
        columns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Id,
    Level,
    Message,
    Meta,
    Timestamp,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Id,
        Column::Level,
        Column::Message,
        Column::Meta,
        Column::Timestamp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Level => "level",
            Column::Message => "message",
            Column::Meta => "meta",
            Column::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|column| column.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown log column '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_parsing() {
        assert_eq!("timestamp".parse::<Column>(), Ok(Column::Timestamp));
        assert_eq!(" Meta ".parse::<Column>(), Ok(Column::Meta));
        assert!("context".parse::<Column>().is_err());
    }

    #[test]
    fn test_projected_row_serializes_only_present_keys() {
        let row = LogRow {
            timestamp: Some(Utc::now()),
            ..LogRow::default()
        };

        let json = serde_json::to_value(&row).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["timestamp"]);
        assert_eq!(row.present_columns(), vec![Column::Timestamp]);
    }
}

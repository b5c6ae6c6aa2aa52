use crate::models::log_row::Column;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            other => Err(format!("unknown sort order '{}', expected asc or desc", other)),
        }
    }
}

/// Filters for a historical query.
///
/// The time window applies only when both `from` and `until` are set; a
/// single bound is ignored. A `rows` of 0 counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub fields: Vec<Column>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rows: Option<u32>,
    #[serde(default)]
    pub order: Option<Order>,
}

impl QueryOptions {
    pub fn new() -> Self {
        QueryOptions::default()
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Column>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.until = Some(until);
        self
    }

    pub fn rows(mut self, rows: u32) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Columns to select; an empty allow-list means every column.
    pub fn projection(&self) -> Vec<Column> {
        if self.fields.is_empty() {
            return Column::ALL.to_vec();
        }
        let mut columns = Vec::with_capacity(self.fields.len());
        for column in &self.fields {
            if !columns.contains(column) {
                columns.push(*column);
            }
        }
        columns
    }

    pub fn time_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.from, self.until) {
            (Some(from), Some(until)) => Some((from, until)),
            _ => None,
        }
    }

    /// Effective row cap, falling back to `default_rows`.
    pub fn row_limit(&self, default_rows: Option<u32>) -> Option<u32> {
        self.rows
            .filter(|rows| *rows > 0)
            .or(default_rows.filter(|rows| *rows > 0))
    }
}

/// Parse an instant given either as epoch milliseconds or RFC 3339 text.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| format!("epoch milliseconds out of range: {}", millis));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("invalid instant '{}': {}", value, err))
}

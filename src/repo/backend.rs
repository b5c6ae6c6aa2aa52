use crate::models::error::Result;
use crate::models::log_row::{Column, LogRow};
use crate::models::query_options::Order;
use chrono::{DateTime, Utc};

/// One row ready to be written. Every column is already defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    pub level: String,
    pub message: String,
    pub meta: String,
    pub timestamp: DateTime<Utc>,
}

/// A resolved select: projection, inclusive time window, cap and sort.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub columns: Vec<Column>,
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub limit: Option<u32>,
    pub order: Option<Order>,
}

impl SelectQuery {
    pub fn all() -> Self {
        SelectQuery {
            columns: Column::ALL.to_vec(),
            window: None,
            limit: None,
            order: None,
        }
    }
}

/// The relational engine as seen by the log store.
///
/// Implementations are blocking; the store runs them on tokio's blocking
/// pool. `create_table` must report an existing table as
/// [`SinkError::TableExists`](crate::models::error::SinkError::TableExists)
/// so concurrent initializers can tell a lost race from a real failure.
pub trait Backend: Send + Sync {
    fn has_table(&self, table: &str) -> Result<bool>;

    fn create_table(&self, table: &str) -> Result<()>;

    fn insert(&self, table: &str, row: &NewRow) -> Result<()>;

    fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<LogRow>>;

    /// Returns the number of deleted rows.
    fn delete_all(&self, table: &str) -> Result<usize>;

    /// Release pooled connections. Must be idempotent.
    fn close(&self) -> Result<()>;
}

use crate::models::error::Result;
use crate::models::log_entry::LogEntry;
use crate::models::log_row::LogRow;
use crate::models::query_options::QueryOptions;
use std::future::Future;

/// Anything the logging front-end can hand entries to.
pub trait LogSink: Send + Sync {
    fn append(&self, entry: LogEntry) -> impl Future<Output = Result<bool>> + Send;

    fn query(&self, options: QueryOptions) -> impl Future<Output = Result<Vec<LogRow>>> + Send;

    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

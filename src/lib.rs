//! A log sink that persists structured log entries into a SQL table and
//! answers time-windowed, projected queries over them.
//!
//! ```no_run
//! use sql_log_sink::{LogEntry, LogStore, Order, QueryOptions, SinkConfig};
//!
//! # async fn run() -> sql_log_sink::Result<()> {
//! let store = LogStore::new(SinkConfig::sqlite("logs.db"))?;
//! store.initialize().await?;
//!
//! store
//!     .append(LogEntry::new("info", "user signed in").with_field("user_id", &42))
//!     .await?;
//!
//! let latest = store
//!     .query(QueryOptions::new().order(Order::Desc).rows(10))
//!     .await?;
//! println!("{} recent records", latest.len());
//!
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod repo;
pub mod service;
pub mod utils;

pub use models::config::{
    setup_config, ClientKind, ConnectionDescriptor, Credentials, PoolConfig, SinkConfig,
};
pub use models::error::{Result, SinkError};
pub use models::log_entry::LogEntry;
pub use models::log_row::{Column, LogRow};
pub use models::query_options::{parse_instant, Order, QueryOptions};
pub use repo::backend::{Backend, NewRow, SelectQuery};
pub use repo::dialect::Dialect;
pub use service::log_store::LogStore;
pub use service::sink::LogSink;
pub use utils::db_logger::{init_sql_logger, SqlLogger};

//! The log store: schema provisioning, the write path and the read path over
//! one pooled backend.

use crate::models::config::{ClientKind, SinkConfig};
use crate::models::config_validator::validate_config;
use crate::models::error::{Result, SinkError};
use crate::models::log_entry::LogEntry;
use crate::models::log_row::LogRow;
use crate::models::query_options::QueryOptions;
use crate::repo::backend::{Backend, NewRow, SelectQuery};
use crate::repo::sqlite::SqliteBackend;
use crate::service::sink::LogSink;
use crate::utils::meta::{encode_meta, merge_meta};
use chrono::Utc;
use log::{debug, info, warn, LevelFilter};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Buffered `logged` notifications per subscriber before the slowest one
/// starts missing events.
const LOGGED_CHANNEL_CAPACITY: usize = 256;

/// Persists log entries into one SQL table and queries them back.
///
/// Cloning is cheap and every clone shares the same pool, so a store can be
/// handed to as many tasks as needed.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    backend: Arc<dyn Backend>,
    client: ClientKind,
    table_name: String,
    label: String,
    level: LevelFilter,
    default_meta: Map<String, Value>,
    silent: bool,
    default_rows: Option<u32>,
    closed: AtomicBool,
    logged: broadcast::Sender<LogEntry>,
}

impl LogStore {
    /// Build a store using the built-in driver for the configured client.
    ///
    /// Only SQLite ships a driver; other clients go through [`LogStore::with_backend`].
    pub fn new(config: SinkConfig) -> Result<Self> {
        validate_config(&config)?;

        let (client, connection) = match (config.client, config.connection.as_ref()) {
            (Some(client), Some(connection)) => (client, connection),
            _ => {
                return Err(SinkError::Configuration(
                    "client and connection must both be defined".to_string(),
                ))
            }
        };

        let backend: Arc<dyn Backend> = match client {
            ClientKind::Sqlite => Arc::new(SqliteBackend::open(connection, &config.pool)?),
            other => {
                return Err(SinkError::Configuration(format!(
                    "no built-in driver for client '{}'; supply one with LogStore::with_backend",
                    other
                )))
            }
        };

        Self::assemble(config, client, backend)
    }

    /// Build a store on top of a caller-supplied backend driver.
    pub fn with_backend(config: SinkConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        validate_config(&config)?;
        let client = config.client.ok_or_else(|| {
            SinkError::Configuration("a database client must be defined".to_string())
        })?;
        Self::assemble(config, client, backend)
    }

    fn assemble(config: SinkConfig, client: ClientKind, backend: Arc<dyn Backend>) -> Result<Self> {
        let level = config.level_filter()?;
        let (logged, _) = broadcast::channel(LOGGED_CHANNEL_CAPACITY);

        info!(
            "Log store ready: client={}, table={}, silent={}",
            client, config.table_name, config.silent
        );

        Ok(LogStore {
            inner: Arc::new(StoreInner {
                backend,
                client,
                table_name: config.table_name,
                label: config.label,
                level,
                default_meta: config.default_meta,
                silent: config.silent,
                default_rows: config.default_rows,
                closed: AtomicBool::new(false),
                logged,
            }),
        })
    }

    pub fn client(&self) -> ClientKind {
        self.inner.client
    }

    pub fn table_name(&self) -> &str {
        &self.inner.table_name
    }

    pub fn level(&self) -> LevelFilter {
        self.inner.level
    }

    pub fn is_silent(&self) -> bool {
        self.inner.silent
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Receive a copy of every entry after its write attempt, whatever the
    /// outcome. Only the result of [`LogStore::append`] says whether the row
    /// was stored.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.inner.logged.subscribe()
    }

    /// Create the log table unless it already exists. Safe to call any number
    /// of times, including from processes racing on the same database.
    pub async fn initialize(&self) -> Result<bool> {
        self.run_blocking(|backend, table| {
            if backend.has_table(table)? {
                debug!("Log table {} already exists", table);
                return Ok(true);
            }

            match backend.create_table(table) {
                Ok(()) => Ok(true),
                Err(SinkError::TableExists(_)) => {
                    debug!("Log table {} was created concurrently", table);
                    Ok(true)
                }
                Err(err) => Err(err),
            }
        })
        .await
    }

    /// Write one entry. Resolves to `Ok(true)` once the row is committed, or
    /// immediately when the store is silent.
    pub async fn append(&self, entry: LogEntry) -> Result<bool> {
        let result = self.write(&entry).await;

        if let Err(err) = &result {
            warn!("Failed to append log entry to {}: {}", self.inner.table_name, err);
        }

        // No subscribers is not an error
        let _ = self.inner.logged.send(entry);

        result
    }

    async fn write(&self, entry: &LogEntry) -> Result<bool> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }

        if self.inner.silent {
            return Ok(true);
        }

        let meta = merge_meta(&self.inner.default_meta, &self.inner.label, &entry.fields);
        let meta = encode_meta(&meta);
        let level = entry.level.clone();
        let message = entry.message.clone();

        self.run_blocking(move |backend, table| {
            let row = NewRow {
                level,
                message,
                meta,
                timestamp: Utc::now(),
            };
            backend.insert(table, &row)?;
            Ok(true)
        })
        .await
    }

    /// Fetch stored records matching `options`.
    pub async fn query(&self, options: QueryOptions) -> Result<Vec<LogRow>> {
        let select = SelectQuery {
            columns: options.projection(),
            window: options.time_window(),
            limit: options.row_limit(self.inner.default_rows),
            order: options.order,
        };

        self.run_blocking(move |backend, table| backend.select(table, &select))
            .await
    }

    /// Delete every stored record in one statement.
    pub async fn drain(&self) -> Result<usize> {
        let deleted = self
            .run_blocking(|backend, table| backend.delete_all(table))
            .await?;
        info!("Drained {} records from {}", deleted, self.inner.table_name);
        Ok(deleted)
    }

    /// Release the pool. Later operations fail with [`SinkError::Closed`].
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.backend.close()).await?
    }

    /// Callback form of [`LogStore::append`]. Must be called from within a
    /// tokio runtime.
    pub fn log<F>(&self, entry: LogEntry, callback: F)
    where
        F: FnOnce(Result<bool>) + Send + 'static,
    {
        let store = self.clone();
        tokio::spawn(async move {
            callback(store.append(entry).await);
        });
    }

    /// Callback form of [`LogStore::query`]. Must be called from within a
    /// tokio runtime.
    pub fn query_with<F>(&self, options: QueryOptions, callback: F)
    where
        F: FnOnce(Result<Vec<LogRow>>) + Send + 'static,
    {
        let store = self.clone();
        tokio::spawn(async move {
            callback(store.query(options).await);
        });
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Backend, &str) -> Result<T> + Send + 'static,
    {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(inner.backend.as_ref(), &inner.table_name)).await?
    }
}

impl LogSink for LogStore {
    fn append(&self, entry: LogEntry) -> impl Future<Output = Result<bool>> + Send {
        LogStore::append(self, entry)
    }

    fn query(&self, options: QueryOptions) -> impl Future<Output = Result<Vec<LogRow>>> + Send {
        LogStore::query(self, options)
    }

    fn close(&self) -> impl Future<Output = Result<()>> + Send {
        LogStore::close(self)
    }
}

use crate::models::config::{ClientKind, ConnectionDescriptor, PoolConfig};
use crate::models::error::{Result, SinkError};
use crate::models::log_row::{Column, LogRow};
use crate::repo::backend::{Backend, NewRow, SelectQuery};
use crate::repo::dialect::{Dialect, SqlValue, Statement, SQLITE_TIMESTAMP_FORMAT};
use crate::utils::meta::decode_meta;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, OptionalExtension, Row};
use std::sync::{Arc, RwLock};
use std::time::Duration;

type DbPool = Pool<SqliteConnectionManager>;

/// SQLite engine behind an r2d2 connection pool.
pub struct SqliteBackend {
    dialect: Dialect,
    db_file: String,
    pool: RwLock<Option<Arc<DbPool>>>,
}

impl SqliteBackend {
    pub fn open(connection: &ConnectionDescriptor, pool_config: &PoolConfig) -> Result<Self> {
        let db_file = resolve_db_file(connection)?;
        info!("Initializing log database connection pool: {}", db_file);

        let is_in_memory = db_file == ":memory:" || db_file.starts_with("file::memory:");
        let use_wal = !is_in_memory;

        let manager = SqliteConnectionManager::file(&db_file).with_init(move |conn| {
            let mut pragmas = String::from(
                "PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            );

            if use_wal {
                pragmas.push_str(" PRAGMA journal_mode = WAL;");
            }

            conn.execute_batch(&pragmas)
        });

        let mut builder = r2d2::Pool::builder()
            .max_size(pool_config.max_size)
            .min_idle(pool_config.min_idle)
            .connection_timeout(Duration::from_secs(pool_config.connection_timeout_secs));

        // An in-memory database lives only as long as a connection to it, so
        // keep one open for the life of the pool. Plain ":memory:" is private
        // to its connection and must not be spread over several.
        if is_in_memory {
            let max_size = if db_file == ":memory:" {
                1
            } else {
                pool_config.max_size
            };
            builder = builder
                .max_size(max_size)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None);
        }

        // Connection failures surface on first use, not at construction
        let pool = builder.build_unchecked(manager);
        debug!("Log database pool configured for {}", db_file);

        Ok(SqliteBackend {
            dialect: Dialect::new(ClientKind::Sqlite),
            db_file,
            pool: RwLock::new(Some(Arc::new(pool))),
        })
    }

    fn get_connection(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        let pool = {
            let pool_lock = self
                .pool
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            pool_lock.as_ref().cloned().ok_or(SinkError::Closed)?
        };

        pool.get().map_err(|cause| SinkError::DatabaseConnection {
            path: self.db_file.clone(),
            cause,
        })
    }
}

impl Backend for SqliteBackend {
    fn has_table(&self, table: &str) -> Result<bool> {
        let conn = self.get_connection()?;
        let statement = self.dialect.table_exists(table);

        let found: Option<i64> = conn
            .query_row(&statement.sql, params_from_iter(bind_values(&statement)), |row| {
                row.get(0)
            })
            .optional()
            .map_err(|cause| SinkError::DatabaseQuery {
                operation: format!("check table {}", table),
                cause,
            })?;

        Ok(found.is_some())
    }

    fn create_table(&self, table: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let statement = self.dialect.create_table(table);

        conn.execute(&statement.sql, [])
            .map_err(|cause| {
                if is_already_exists(&cause) {
                    SinkError::TableExists(table.to_string())
                } else {
                    SinkError::DatabaseQuery {
                        operation: format!("create table {}", table),
                        cause,
                    }
                }
            })?;

        info!("Created log table {}", table);
        Ok(())
    }

    fn insert(&self, table: &str, row: &NewRow) -> Result<()> {
        let conn = self.get_connection()?;
        let statement = self.dialect.insert(table, row);

        conn.execute(&statement.sql, params_from_iter(bind_values(&statement)))
            .map_err(|cause| SinkError::DatabaseInsert {
                table: table.to_string(),
                cause,
            })?;

        Ok(())
    }

    fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<LogRow>> {
        let conn = self.get_connection()?;
        let statement = self.dialect.select(table, query);
        let columns = if query.columns.is_empty() {
            Column::ALL.to_vec()
        } else {
            query.columns.clone()
        };

        let mut stmt = conn
            .prepare(&statement.sql)
            .map_err(|cause| SinkError::DatabaseQuery {
                operation: "query logs".to_string(),
                cause,
            })?;

        let rows = stmt
            .query_map(params_from_iter(bind_values(&statement)), |row| {
                map_log_row(row, &columns)
            })
            .map_err(|cause| SinkError::DatabaseQuery {
                operation: "query logs".to_string(),
                cause,
            })?;

        rows.collect::<rusqlite::Result<Vec<LogRow>>>()
            .map_err(|cause| SinkError::DatabaseQuery {
                operation: "collect log rows".to_string(),
                cause,
            })
    }

    fn delete_all(&self, table: &str) -> Result<usize> {
        let conn = self.get_connection()?;
        let statement = self.dialect.delete_all(table);

        let deleted = conn
            .execute(&statement.sql, [])
            .map_err(|cause| SinkError::DatabaseQuery {
                operation: "delete logs".to_string(),
                cause,
            })?;

        debug!("Deleted {} log entries", deleted);
        Ok(deleted)
    }

    fn close(&self) -> Result<()> {
        let mut pool_lock = self
            .pool
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if pool_lock.take().is_some() {
            info!("Closed log database pool: {}", self.db_file);
        }
        Ok(())
    }
}

fn resolve_db_file(connection: &ConnectionDescriptor) -> Result<String> {
    let db_file = match connection {
        ConnectionDescriptor::Uri(uri) => {
            let uri = uri.trim();
            uri.strip_prefix("sqlite://")
                .or_else(|| uri.strip_prefix("sqlite:"))
                .unwrap_or(uri)
                .to_string()
        }
        ConnectionDescriptor::Credentials(credentials) => {
            credentials.database.clone().unwrap_or_default()
        }
    };

    if db_file.is_empty() {
        return Err(SinkError::Configuration(
            "Database file path cannot be empty. Provide a valid path or use ':memory:' for in-memory database.".to_string(),
        ));
    }

    Ok(db_file)
}

fn bind_values(statement: &Statement) -> Vec<Value> {
    statement
        .params
        .iter()
        .map(|param| match param {
            SqlValue::Text(text) => Value::Text(text.clone()),
            SqlValue::Integer(int) => Value::Integer(*int),
            SqlValue::Timestamp(instant) => {
                Value::Text(instant.format(SQLITE_TIMESTAMP_FORMAT).to_string())
            }
        })
        .collect()
}

fn is_already_exists(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(_, Some(message)) if message.contains("already exists"))
}

fn map_log_row(row: &Row<'_>, columns: &[Column]) -> rusqlite::Result<LogRow> {
    let mut log_row = LogRow::default();

    for (idx, column) in columns.iter().enumerate() {
        match column {
            Column::Id => log_row.id = Some(row.get(idx)?),
            Column::Level => {
                log_row.level = Some(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
            }
            Column::Message => {
                log_row.message = Some(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
            }
            Column::Meta => {
                let raw: Option<String> = row.get(idx)?;
                log_row.meta = Some(decode_meta(raw.as_deref()));
            }
            Column::Timestamp => {
                let raw: String = row.get(idx)?;
                let instant = parse_timestamp(&raw).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        idx,
                        Type::Text,
                        format!("invalid log timestamp '{}'", raw).into(),
                    )
                })?;
                log_row.timestamp = Some(instant);
            }
        }
    }

    Ok(log_row)
}

/// Reads both the store's own ISO-8601 format and SQLite's
/// `CURRENT_TIMESTAMP` layout, which rows written by other tools may carry.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

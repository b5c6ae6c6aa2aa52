use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Invalid log sink configuration: {0}")]
    Configuration(String),

    #[error("Failed to read config file '{path}': {cause}")]
    ConfigRead { path: PathBuf, cause: io::Error },

    #[error("Failed to parse config file '{path}': {cause}")]
    ConfigParse {
        path: PathBuf,
        cause: serde_json::Error,
    },

    #[error("Failed to open database '{path}': {cause}")]
    DatabaseConnection { path: String, cause: r2d2::Error },

    #[error("Database query failed for '{operation}': {cause}")]
    DatabaseQuery {
        operation: String,
        cause: rusqlite::Error,
    },

    #[error("Failed to insert into {table}: {cause}")]
    DatabaseInsert {
        table: String,
        cause: rusqlite::Error,
    },

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Log store is closed")]
    Closed,

    #[error("Background database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SinkError {
    /// True for failures raised by the storage backend while an operation
    /// was running, as opposed to construction-time misconfiguration.
    pub fn is_storage(&self) -> bool {
        !matches!(
            self,
            SinkError::Configuration(_) | SinkError::ConfigRead { .. } | SinkError::ConfigParse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_not_storage_errors() {
        assert!(!SinkError::Configuration("missing client".to_string()).is_storage());
        assert!(SinkError::Closed.is_storage());
        assert!(SinkError::TableExists("winston_logs".to_string()).is_storage());
    }

    #[test]
    fn test_error_messages_name_the_operation() {
        let err = SinkError::DatabaseQuery {
            operation: "select logs".to_string(),
            cause: rusqlite::Error::QueryReturnedNoRows,
        };
        assert!(err.to_string().contains("select logs"));
    }
}

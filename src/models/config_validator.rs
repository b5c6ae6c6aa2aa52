use crate::models::config::{parse_level, ConnectionDescriptor, SinkConfig};
use crate::models::error::{Result, SinkError};
use log::{info, warn};

/// Longest identifier accepted by every supported backend (Postgres truncates at 63).
const MAX_TABLE_NAME_LEN: usize = 63;

/// Validates the entire configuration
pub fn validate_config(config: &SinkConfig) -> Result<()> {
    info!("Validating log sink configuration...");

    validate_client(config)?;

    validate_connection(config.connection.as_ref())?;

    validate_table_name(&config.table_name)?;

    validate_level(&config.level)?;

    validate_pool(config)?;

    info!("Configuration validation passed");
    Ok(())
}

fn validate_client(config: &SinkConfig) -> Result<()> {
    if config.client.is_none() {
        return Err(SinkError::Configuration(
            "a database client must be defined (sqlite, pg, mysql or mssql)".to_string(),
        ));
    }
    Ok(())
}

fn validate_connection(connection: Option<&ConnectionDescriptor>) -> Result<()> {
    match connection {
        None => Err(SinkError::Configuration(
            "a database connection (URI or credentials) must be defined".to_string(),
        )),
        Some(ConnectionDescriptor::Uri(uri)) if uri.trim().is_empty() => Err(
            SinkError::Configuration(
                "Database connection URI cannot be empty. Provide a valid URI or use ':memory:' for an in-memory SQLite database."
                    .to_string(),
            ),
        ),
        Some(_) => Ok(()),
    }
}

/// Table names are interpolated into SQL as quoted identifiers, so only a
/// conservative character set is allowed.
pub fn validate_table_name(table_name: &str) -> Result<()> {
    if table_name.is_empty() {
        return Err(SinkError::Configuration(
            "table_name cannot be empty".to_string(),
        ));
    }

    if table_name.len() > MAX_TABLE_NAME_LEN {
        return Err(SinkError::Configuration(format!(
            "table_name '{}' is longer than {} characters",
            table_name, MAX_TABLE_NAME_LEN
        )));
    }

    let starts_ok = table_name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let rest_ok = table_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !starts_ok || !rest_ok {
        return Err(SinkError::Configuration(format!(
            "table_name '{}' may only contain ASCII letters, digits and '_' and must not start with a digit",
            table_name
        )));
    }

    Ok(())
}

fn validate_level(level: &str) -> Result<()> {
    if parse_level(level).is_none() {
        return Err(SinkError::Configuration(format!(
            "unknown log level '{}'",
            level
        )));
    }
    Ok(())
}

fn validate_pool(config: &SinkConfig) -> Result<()> {
    if config.pool.max_size == 0 {
        return Err(SinkError::Configuration(
            "pool.max_size must be greater than 0".to_string(),
        ));
    }

    if let Some(min_idle) = config.pool.min_idle {
        if min_idle > config.pool.max_size {
            return Err(SinkError::Configuration(format!(
                "pool.min_idle ({}) cannot exceed pool.max_size ({})",
                min_idle, config.pool.max_size
            )));
        }
    }

    if config.default_rows == Some(0) {
        warn!("default_rows is 0, queries without a row cap will be unbounded");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ClientKind;

    #[test]
    fn test_valid_sqlite_config() {
        assert!(validate_config(&SinkConfig::sqlite("logs.db")).is_ok());
    }

    #[test]
    fn test_missing_connection_is_rejected() {
        let config = SinkConfig {
            client: Some(ClientKind::Mysql),
            ..SinkConfig::default()
        };

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("connection"));
    }

    #[test]
    fn test_empty_uri_is_rejected() {
        assert!(validate_config(&SinkConfig::sqlite("  ")).is_err());
    }

    #[test]
    fn test_table_name_rules() {
        assert!(validate_table_name("winston_logs").is_ok());
        assert!(validate_table_name("_audit2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2logs").is_err());
        assert!(validate_table_name("logs\"; DROP TABLE x; --").is_err());
        assert!(validate_table_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let config = SinkConfig {
            level: "chatty".to_string(),
            ..SinkConfig::sqlite("logs.db")
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_min_idle_above_max_size_is_rejected() {
        let mut config = SinkConfig::sqlite("logs.db");
        config.pool.max_size = 2;
        config.pool.min_idle = Some(3);
        assert!(validate_config(&config).is_err());
    }
}

//! SQL text for the five statements the log store issues, per backend kind.

use crate::models::config::ClientKind;
use crate::models::log_row::Column;
use crate::repo::backend::{NewRow, SelectQuery};
use chrono::{DateTime, Datelike, Duration, Utc};

/// SQLite has no native timestamp type; instants are stored as fixed-width
/// ISO-8601 text so that string comparison matches chronological order.
pub const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Text range of `SQLITE_TIMESTAMP_FORMAT`. Outside four-digit years `%Y`
/// gains a sign and the text no longer sorts chronologically.
const SQLITE_MIN_TIMESTAMP: &str = "0000-01-01T00:00:00.000Z";
const SQLITE_MAX_TIMESTAMP: &str = "9999-12-31T23:59:59.999Z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Lower,
    Upper,
}

/// Render a window bound as stored SQLite text. Stored values carry whole
/// milliseconds, so a lower bound rounds up and an upper bound truncates.
fn sqlite_bound(instant: DateTime<Utc>, bound: Bound) -> String {
    let sub_millis = i64::from(instant.timestamp_subsec_nanos() % 1_000_000);
    let instant = if bound == Bound::Lower && sub_millis != 0 {
        match instant.checked_add_signed(Duration::nanoseconds(1_000_000 - sub_millis)) {
            Some(rounded) => rounded,
            None => return SQLITE_MAX_TIMESTAMP.to_string(),
        }
    } else {
        instant
    };

    match instant.year() {
        year if year < 0 => SQLITE_MIN_TIMESTAMP.to_string(),
        year if year > 9999 => SQLITE_MAX_TIMESTAMP.to_string(),
        _ => instant.format(SQLITE_TIMESTAMP_FORMAT).to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Statement {
            sql,
            params: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    kind: ClientKind,
}

impl Dialect {
    pub fn new(kind: ClientKind) -> Self {
        Dialect { kind }
    }

    /// Quote an identifier. Table names are validated at configuration time,
    /// so the quote characters themselves never appear inside `ident`.
    pub fn quote(&self, ident: &str) -> String {
        match self.kind {
            ClientKind::Sqlite | ClientKind::Pg => format!("\"{}\"", ident),
            ClientKind::Mysql => format!("`{}`", ident),
            ClientKind::Mssql => format!("[{}]", ident),
        }
    }

    /// 1-based bind parameter marker.
    fn placeholder(&self, index: usize) -> String {
        match self.kind {
            ClientKind::Sqlite => format!("?{}", index),
            ClientKind::Pg => format!("${}", index),
            ClientKind::Mysql => "?".to_string(),
            ClientKind::Mssql => format!("@P{}", index),
        }
    }

    fn bind(&self, statement: &mut Statement, value: SqlValue) -> String {
        statement.params.push(value);
        self.placeholder(statement.params.len())
    }

    fn window_bound(&self, instant: DateTime<Utc>, bound: Bound) -> SqlValue {
        match self.kind {
            ClientKind::Sqlite => SqlValue::Text(sqlite_bound(instant, bound)),
            _ => SqlValue::Timestamp(instant),
        }
    }

    pub fn table_exists(&self, table: &str) -> Statement {
        let mut statement = Statement::new(String::new());
        let name = self.bind(&mut statement, SqlValue::Text(table.to_string()));
        statement.sql = match self.kind {
            ClientKind::Sqlite => format!(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = {}",
                name
            ),
            ClientKind::Pg => format!(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = {}",
                name
            ),
            ClientKind::Mysql => format!(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = {}",
                name
            ),
            ClientKind::Mssql => format!(
                "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = {}",
                name
            ),
        };
        statement
    }

    /// Plain `CREATE TABLE`, without `IF NOT EXISTS`: losing a creation race
    /// must surface as an "already exists" failure.
    pub fn create_table(&self, table: &str) -> Statement {
        let (id, text, timestamp) = match self.kind {
            ClientKind::Sqlite => (
                "INTEGER PRIMARY KEY AUTOINCREMENT",
                "TEXT",
                "TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            ),
            ClientKind::Pg => (
                "SERIAL PRIMARY KEY",
                "TEXT",
                "TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP",
            ),
            ClientKind::Mysql => (
                "INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY",
                "TEXT",
                "DATETIME(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3)",
            ),
            ClientKind::Mssql => (
                "INT IDENTITY(1,1) PRIMARY KEY",
                "NVARCHAR(MAX)",
                "DATETIME2 NOT NULL DEFAULT SYSUTCDATETIME()",
            ),
        };

        Statement::new(format!(
            "CREATE TABLE {} ({} {}, {} {}, {} {}, {} {}, {} {})",
            self.quote(table),
            self.quote(Column::Id.name()),
            id,
            self.quote(Column::Level.name()),
            text,
            self.quote(Column::Message.name()),
            text,
            self.quote(Column::Meta.name()),
            text,
            self.quote(Column::Timestamp.name()),
            timestamp,
        ))
    }

    pub fn insert(&self, table: &str, row: &NewRow) -> Statement {
        let mut statement = Statement::new(String::new());
        let values = [
            self.bind(&mut statement, SqlValue::Text(row.level.clone())),
            self.bind(&mut statement, SqlValue::Text(row.message.clone())),
            self.bind(&mut statement, SqlValue::Text(row.meta.clone())),
            self.bind(&mut statement, SqlValue::Timestamp(row.timestamp)),
        ];
        let columns = [Column::Level, Column::Message, Column::Meta, Column::Timestamp]
            .iter()
            .map(|column| self.quote(column.name()))
            .collect::<Vec<_>>();

        statement.sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote(table),
            columns.join(", "),
            values.join(", ")
        );
        statement
    }

    pub fn select(&self, table: &str, query: &SelectQuery) -> Statement {
        let mut statement = Statement::new(String::new());
        let timestamp = self.quote(Column::Timestamp.name());

        // SQL Server caps rows up front, everyone else at the end
        let top = match (self.kind, query.limit) {
            (ClientKind::Mssql, Some(limit)) => {
                let marker = self.bind(&mut statement, SqlValue::Integer(limit as i64));
                format!("TOP ({}) ", marker)
            }
            _ => String::new(),
        };

        let columns = if query.columns.is_empty() {
            Column::ALL.to_vec()
        } else {
            query.columns.clone()
        };
        let projection = columns
            .iter()
            .map(|column| self.quote(column.name()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("SELECT {}{} FROM {}", top, projection, self.quote(table));

        if let Some((from, until)) = query.window {
            let from = self.window_bound(from, Bound::Lower);
            let from = self.bind(&mut statement, from);
            let until = self.window_bound(until, Bound::Upper);
            let until = self.bind(&mut statement, until);
            sql.push_str(&format!(
                " WHERE {} >= {} AND {} <= {}",
                timestamp, from, timestamp, until
            ));
        }

        if let Some(order) = query.order {
            sql.push_str(&format!(" ORDER BY {} {}", timestamp, order.as_sql()));
        }

        if self.kind != ClientKind::Mssql {
            if let Some(limit) = query.limit {
                let marker = self.bind(&mut statement, SqlValue::Integer(limit as i64));
                sql.push_str(&format!(" LIMIT {}", marker));
            }
        }

        statement.sql = sql;
        statement
    }

    pub fn delete_all(&self, table: &str) -> Statement {
        Statement::new(format!("DELETE FROM {}", self.quote(table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::query_options::Order;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
    }

    fn filtered_query() -> SelectQuery {
        SelectQuery {
            columns: vec![Column::Message, Column::Timestamp],
            window: Some(window()),
            limit: Some(10),
            order: Some(Order::Desc),
        }
    }

    #[test]
    fn test_sqlite_select_with_every_filter() {
        let statement = Dialect::new(ClientKind::Sqlite).select("winston_logs", &filtered_query());

        assert_eq!(
            statement.sql,
            "SELECT \"message\", \"timestamp\" FROM \"winston_logs\" \
             WHERE \"timestamp\" >= ?1 AND \"timestamp\" <= ?2 \
             ORDER BY \"timestamp\" DESC LIMIT ?3"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("2024-01-01T00:00:00.000Z".to_string()),
                SqlValue::Text("2024-01-02T00:00:00.000Z".to_string()),
                SqlValue::Integer(10)
            ]
        );
    }

    #[test]
    fn test_sqlite_bounds_round_to_stored_precision() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + Duration::microseconds(811_500);

        assert_eq!(
            sqlite_bound(instant, Bound::Lower),
            "2024-01-01T12:00:00.812Z"
        );
        assert_eq!(
            sqlite_bound(instant, Bound::Upper),
            "2024-01-01T12:00:00.811Z"
        );

        let exact = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(sqlite_bound(exact, Bound::Lower), "2024-01-01T12:00:00.000Z");
    }

    #[test]
    fn test_sqlite_bounds_clamp_outside_four_digit_years() {
        let far_future = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(sqlite_bound(far_future, Bound::Upper), SQLITE_MAX_TIMESTAMP);
        assert_eq!(sqlite_bound(far_future, Bound::Lower), SQLITE_MAX_TIMESTAMP);

        let far_past = Utc.with_ymd_and_hms(-1, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(sqlite_bound(far_past, Bound::Lower), SQLITE_MIN_TIMESTAMP);

        let last_instant = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()
            + Duration::microseconds(999_500);
        assert_eq!(sqlite_bound(last_instant, Bound::Lower), SQLITE_MAX_TIMESTAMP);
    }

    #[test]
    fn test_other_backends_bind_native_timestamps() {
        let statement = Dialect::new(ClientKind::Pg).select("logs", &filtered_query());
        let (from, until) = window();
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Timestamp(from),
                SqlValue::Timestamp(until),
                SqlValue::Integer(10)
            ]
        );
    }

    #[test]
    fn test_postgres_uses_numbered_placeholders() {
        let statement = Dialect::new(ClientKind::Pg).select("logs", &filtered_query());
        assert!(statement.sql.contains("\"timestamp\" >= $1 AND \"timestamp\" <= $2"));
        assert!(statement.sql.ends_with("LIMIT $3"));
    }

    #[test]
    fn test_mysql_uses_backticks_and_positional_markers() {
        let statement = Dialect::new(ClientKind::Mysql).select("logs", &filtered_query());
        assert_eq!(
            statement.sql,
            "SELECT `message`, `timestamp` FROM `logs` \
             WHERE `timestamp` >= ? AND `timestamp` <= ? \
             ORDER BY `timestamp` DESC LIMIT ?"
        );
    }

    #[test]
    fn test_mssql_caps_rows_with_top() {
        let statement = Dialect::new(ClientKind::Mssql).select("logs", &filtered_query());

        assert_eq!(
            statement.sql,
            "SELECT TOP (@P1) [message], [timestamp] FROM [logs] \
             WHERE [timestamp] >= @P2 AND [timestamp] <= @P3 \
             ORDER BY [timestamp] DESC"
        );
        assert_eq!(statement.params[0], SqlValue::Integer(10));
    }

    #[test]
    fn test_unfiltered_select_projects_every_column() {
        let statement = Dialect::new(ClientKind::Sqlite).select("logs", &SelectQuery::all());
        assert_eq!(
            statement.sql,
            "SELECT \"id\", \"level\", \"message\", \"meta\", \"timestamp\" FROM \"logs\""
        );
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_insert_binds_every_column() {
        let row = NewRow {
            level: "info".to_string(),
            message: "started".to_string(),
            meta: "{}".to_string(),
            timestamp: window().0,
        };

        let statement = Dialect::new(ClientKind::Pg).insert("winston_logs", &row);

        assert_eq!(
            statement.sql,
            "INSERT INTO \"winston_logs\" (\"level\", \"message\", \"meta\", \"timestamp\") \
             VALUES ($1, $2, $3, $4)"
        );
        assert_eq!(statement.params.len(), 4);
    }

    #[test]
    fn test_create_table_per_backend() {
        let sqlite = Dialect::new(ClientKind::Sqlite).create_table("winston_logs");
        assert!(sqlite.sql.starts_with("CREATE TABLE \"winston_logs\""));
        assert!(!sqlite.sql.contains("IF NOT EXISTS"));
        assert!(sqlite.sql.contains("AUTOINCREMENT"));

        let pg = Dialect::new(ClientKind::Pg).create_table("winston_logs");
        assert!(pg.sql.contains("\"id\" SERIAL PRIMARY KEY"));

        let mysql = Dialect::new(ClientKind::Mysql).create_table("winston_logs");
        assert!(mysql.sql.contains("CURRENT_TIMESTAMP(3)"));

        let mssql = Dialect::new(ClientKind::Mssql).create_table("winston_logs");
        assert!(mssql.sql.contains("[id] INT IDENTITY(1,1) PRIMARY KEY"));
    }

    #[test]
    fn test_table_exists_binds_the_name() {
        let statement = Dialect::new(ClientKind::Mssql).table_exists("winston_logs");
        assert!(statement.sql.ends_with("TABLE_NAME = @P1"));
        assert_eq!(
            statement.params,
            vec![SqlValue::Text("winston_logs".to_string())]
        );
    }

    #[test]
    fn test_delete_all() {
        let statement = Dialect::new(ClientKind::Mysql).delete_all("winston_logs");
        assert_eq!(statement.sql, "DELETE FROM `winston_logs`");
    }
}

use crate::models::log_entry::LogEntry;
use crate::service::sink::LogSink;
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Records emitted by this crate are never forwarded, otherwise every write
/// would log about itself.
const OWN_TARGET: &str = "sql_log_sink";

/// Dependencies that log from inside a write. r2d2 reports each failed
/// connection attempt, which would feed back into the store during an outage.
const STORAGE_TARGETS: [&str; 1] = ["r2d2"];

/// `log` facade front-end that forwards records into a [`LogSink`].
pub struct SqlLogger {
    level: LevelFilter,
    tx: UnboundedSender<LogEntry>,
}

impl SqlLogger {
    /// Create a new SqlLogger and start the background writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<S>(sink: S, level: LevelFilter) -> Self
    where
        S: LogSink + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<LogEntry>();

        tokio::spawn(log_writer_worker(sink, rx));

        SqlLogger { level, tx }
    }

    /// Get the log level filter
    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

impl Log for SqlLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
            && !is_own_target(metadata.target())
            && !is_storage_target(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _ = self.tx.send(entry_from_record(record));
    }

    fn flush(&self) {
        // Entries are handed off as soon as they are logged
    }
}

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET || target.starts_with("sql_log_sink::")
}

fn is_storage_target(target: &str) -> bool {
    STORAGE_TARGETS.iter().any(|storage| {
        target == *storage
            || target
                .strip_prefix(storage)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "error",
        Level::Warn => "warn",
        Level::Info => "info",
        Level::Debug => "debug",
        Level::Trace => "trace",
    }
}

fn entry_from_record(record: &Record) -> LogEntry {
    let mut entry = LogEntry::new(level_name(record.level()), record.args().to_string());

    entry
        .fields
        .insert("target".to_string(), Value::String(record.target().to_string()));
    if let Some(module) = record.module_path() {
        entry
            .fields
            .insert("module".to_string(), Value::String(module.to_string()));
    }
    if let Some(file) = record.file() {
        entry
            .fields
            .insert("file".to_string(), Value::String(file.to_string()));
    }
    if let Some(line) = record.line() {
        entry.fields.insert("line".to_string(), Value::from(line));
    }

    entry
}

/// Background worker that appends forwarded entries to the sink
async fn log_writer_worker<S: LogSink>(sink: S, mut rx: UnboundedReceiver<LogEntry>) {
    while let Some(entry) = rx.recv().await {
        // Reported on stderr: logging the failure would loop back in here
        if let Err(err) = sink.append(entry).await {
            eprintln!("sql-log-sink: failed to store log entry: {}", err);
        }
    }
}

/// Install a [`SqlLogger`] as the global logger.
pub fn init_sql_logger<S>(sink: S, level: LevelFilter) -> Result<(), log::SetLoggerError>
where
    S: LogSink + 'static,
{
    let logger = SqlLogger::new(sink, level);
    log::set_max_level(level);
    log::set_boxed_logger(Box::new(logger))
}

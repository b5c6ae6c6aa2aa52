use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde_json::{Map, Value};
use sql_log_sink::{parse_instant, setup_config, Column, LogEntry, LogStore, Order, QueryOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Warn,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    let config = setup_config(args.config_file).context("Failed to load configuration")?;
    debug!("Loaded config: {:?}", &config);

    let store = LogStore::new(config).context("Failed to create log store")?;
    store
        .initialize()
        .await
        .context("Failed to initialize log table")?;

    let outcome = run_command(&store, args.command).await;
    store.close().await.context("Failed to close log store")?;
    outcome
}

#[derive(Parser)]
#[command(name = "sql-log-sink")]
#[command(about = "Store and query structured log entries in a SQL table", long_about = None)]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        default_value = "sink.json",
        env = "SQL_LOG_SINK_CONFIG"
    )]
    config_file: String,

    #[arg(
        short = 'l',
        long = "log-level",
        default_value = "warn",
        env = "LOG_LEVEL"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the log table if it does not exist yet
    Init,

    /// Append one entry
    Append {
        #[arg(short = 'L', long = "level", default_value = "info")]
        level: String,

        #[arg(short = 'm', long = "message")]
        message: String,

        /// Extra metadata as a JSON object
        #[arg(long = "meta")]
        meta: Option<String>,
    },

    /// Print stored entries as JSON
    Query {
        /// Comma-separated columns to project
        #[arg(long = "fields", value_delimiter = ',')]
        fields: Vec<Column>,

        /// Window start (RFC 3339 or epoch milliseconds); needs --until
        #[arg(long = "from", value_parser = parse_instant)]
        from: Option<DateTime<Utc>>,

        /// Window end (RFC 3339 or epoch milliseconds); needs --from
        #[arg(long = "until", value_parser = parse_instant)]
        until: Option<DateTime<Utc>>,

        #[arg(short = 'r', long = "rows")]
        rows: Option<u32>,

        #[arg(short = 'o', long = "order")]
        order: Option<Order>,
    },

    /// Delete every stored entry
    Drain,
}

async fn run_command(store: &LogStore, command: Command) -> Result<()> {
    match command {
        Command::Init => {
            info!("Log table {} is ready", store.table_name());
            println!("Table {} is ready", store.table_name());
        }
        Command::Append {
            level,
            message,
            meta,
        } => {
            let mut entry = LogEntry::new(level, message);
            if let Some(meta) = meta {
                let fields: Map<String, Value> =
                    serde_json::from_str(&meta).context("--meta must be a JSON object")?;
                entry.fields = fields;
            }

            store
                .append(entry)
                .await
                .context("Failed to append log entry")?;

            if store.is_silent() {
                println!("Store is silent, entry was not written");
            }
        }
        Command::Query {
            fields,
            from,
            until,
            rows,
            order,
        } => {
            let options = QueryOptions {
                fields,
                from,
                until,
                rows,
                order,
            };
            let records = store.query(options).await.context("Failed to query logs")?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Drain => {
            let deleted = store.drain().await.context("Failed to drain logs")?;
            println!("Deleted {} entries from {}", deleted, store.table_name());
        }
    }

    Ok(())
}

pub mod config;
pub mod config_validator;
pub mod error;
pub mod log_entry;
pub mod log_row;
pub mod query_options;

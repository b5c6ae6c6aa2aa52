pub mod db_logger;
pub mod meta;

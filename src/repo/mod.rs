pub mod backend;
pub mod dialect;
pub mod sqlite;

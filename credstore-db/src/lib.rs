pub type DbBackend = sqlx::Sqlite;

pub mod users;

pub use credstore_db_connection::{create_pool, DbConnectionConfig, DbConnectionError, DbPool};

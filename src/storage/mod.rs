//! SQLite persistence: connection pool, schema migrations and the score store

pub mod db;
pub mod migrations;
pub mod score_store;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use score_store::SqliteScoreStore;

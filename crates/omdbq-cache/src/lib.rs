//! Persistent cache for OMDb search results.
//!
//! Uses `rusqlite` (bundled `SQLite`) to keep result tables between runs,
//! implementing the `TableCache` trait from `omdbq-api`.

mod connection;
mod migrations;
/// `SQLite`-backed `TableCache`.
pub mod search_cache;

pub use connection::{DB_FILE_NAME, open_db};
pub use search_cache::SqliteCache;

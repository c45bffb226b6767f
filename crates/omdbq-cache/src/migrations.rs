//! Schema version management using `PRAGMA user_version`.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version.
const CURRENT_VERSION: u32 = 1;

/// Runs database migrations up to `CURRENT_VERSION`.
///
/// # Errors
///
/// Returns an error if any SQL statement fails.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;

    if version < 1 {
        migrate_v1(conn).context("migration to v1 failed")?;
    }

    conn.pragma_update(None, "user_version", CURRENT_VERSION)
        .context("failed to update user_version")?;

    Ok(())
}

/// Migration to v1: `search_cache` keyed by endpoint, query and detail
/// flag, with an expiry index for purging.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS search_cache (
            endpoint     TEXT    NOT NULL,
            query        TEXT    NOT NULL,
            detail       INTEGER NOT NULL,
            table_json   TEXT    NOT NULL,
            expires_at   INTEGER NOT NULL,
            PRIMARY KEY (endpoint, query, detail)
        );
        CREATE INDEX IF NOT EXISTS idx_search_cache_expires_at ON search_cache(expires_at);",
    )
    .context("failed to create search_cache table")?;

    Ok(())
}

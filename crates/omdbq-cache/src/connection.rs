//! Opening the cache database file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::migrations::run_migrations;

/// Cache database file name inside the data directory.
pub const DB_FILE_NAME: &str = "omdbq.db";

/// How long a writer waits for another `omdbq` process holding the lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) the cache database at `db_path` and migrates it.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created, or if
/// migrations fail.
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open cache database {}", db_path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;

    run_migrations(&conn).context("cache schema migration failed")?;

    tracing::debug!(path = %db_path.display(), "Cache database opened");
    Ok(conn)
}

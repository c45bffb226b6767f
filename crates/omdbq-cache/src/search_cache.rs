//! Search result cache stored in `SQLite`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use omdbq_api::{CacheKey, ResultTable, TableCache};
use rusqlite::{Connection, OptionalExtension};

use super::connection::{DB_FILE_NAME, open_db};

/// `TableCache` backed by the `search_cache` table.
///
/// Tables are stored as JSON with an absolute expiry in UTC epoch
/// milliseconds, so entries survive restarts but not their TTL.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Wraps an already-migrated connection.
    #[must_use]
    pub const fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens `omdbq.db` inside `data_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(Self::new(open_db(&data_dir.join(DB_FILE_NAME))?))
    }

    /// Deletes every expired entry and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = now_millis();
        let removed = self
            .lock()?
            .execute(
                "DELETE FROM search_cache WHERE expires_at <= ?1",
                rusqlite::params![now],
            )
            .context("failed to purge expired cache entries")?;
        tracing::debug!(removed, "Purged expired cache entries");
        Ok(removed)
    }

    /// Number of stored entries, fresh or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM search_cache", [], |row| row.get(0))
            .context("failed to count cache entries")?;
        usize::try_from(count).context("failed to convert cache entry count")
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("cache connection lock poisoned"))
    }
}

/// Current time in UTC epoch milliseconds.
fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `now + ttl` in epoch milliseconds, saturating at `i64::MAX`.
fn expiry_millis(now: i64, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.saturating_add(ttl_ms)
}

impl TableCache for SqliteCache {
    fn get(&self, key: &CacheKey) -> Result<Option<ResultTable>> {
        let conn = self.lock()?;
        let now = now_millis();

        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT table_json, expires_at FROM search_cache
                 WHERE endpoint = ?1 AND query = ?2 AND detail = ?3",
                rusqlite::params![key.endpoint, key.query, key.detail],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("failed to query search_cache")?;

        let Some((json, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= now {
            conn.execute(
                "DELETE FROM search_cache WHERE endpoint = ?1 AND query = ?2 AND detail = ?3",
                rusqlite::params![key.endpoint, key.query, key.detail],
            )
            .context("failed to delete expired cache entry")?;
            tracing::debug!(query = %key.query, detail = key.detail, "Cache entry expired");
            return Ok(None);
        }

        let table: ResultTable =
            serde_json::from_str(&json).context("failed to decode cached result table")?;
        Ok(Some(table))
    }

    fn put(&self, key: CacheKey, table: &ResultTable, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let json = serde_json::to_string(table).context("failed to encode result table")?;

        self.lock()?
            .execute(
                "INSERT INTO search_cache (endpoint, query, detail, table_json, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(endpoint, query, detail) DO UPDATE SET
                    table_json = excluded.table_json,
                    expires_at = excluded.expires_at",
                rusqlite::params![
                    key.endpoint,
                    key.query,
                    key.detail,
                    json,
                    expiry_millis(now_millis(), ttl)
                ],
            )
            .with_context(|| format!("failed to store cache entry for {}", key.query))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let removed = self
            .lock()?
            .execute("DELETE FROM search_cache", [])
            .context("failed to clear search_cache")?;
        tracing::debug!(removed, "Cleared cache entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::migrations::run_migrations;

    const ENDPOINT: &str = "http://www.omdbapi.com/";

    fn memory_cache() -> SqliteCache {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        SqliteCache::new(conn)
    }

    fn sample_table() -> ResultTable {
        serde_json::from_str(
            r#"{"columns":["Title","Year"],"rows":[{"Title":"Batman","Year":"1989"}],"total_results":1}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_put_then_get() {
        // Arrange
        let cache = memory_cache();
        let key = CacheKey::new(ENDPOINT, "s=Batman", false);

        // Act
        cache
            .put(key.clone(), &sample_table(), Duration::from_secs(60))
            .unwrap();
        let cached = cache.get(&key).unwrap();

        // Assert
        assert_eq!(cached, Some(sample_table()));
    }

    #[test]
    fn test_put_overwrites_existing_entry() {
        // Arrange
        let cache = memory_cache();
        let key = CacheKey::new(ENDPOINT, "s=Batman", true);
        cache
            .put(key.clone(), &ResultTable::default(), Duration::from_secs(60))
            .unwrap();

        // Act
        cache
            .put(key.clone(), &sample_table(), Duration::from_secs(60))
            .unwrap();

        // Assert
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.get(&key).unwrap(), Some(sample_table()));
    }

    #[test]
    fn test_detail_flag_is_part_of_key() {
        // Arrange
        let cache = memory_cache();
        cache
            .put(
                CacheKey::new(ENDPOINT, "s=Batman", false),
                &sample_table(),
                Duration::from_secs(60),
            )
            .unwrap();

        // Act
        let cached = cache
            .get(&CacheKey::new(ENDPOINT, "s=Batman", true))
            .unwrap();

        // Assert
        assert!(cached.is_none());
    }

    #[test]
    fn test_endpoint_is_part_of_key() {
        // Arrange
        let cache = memory_cache();
        cache
            .put(
                CacheKey::new(ENDPOINT, "s=Batman", false),
                &sample_table(),
                Duration::from_secs(60),
            )
            .unwrap();

        // Act
        let cached = cache
            .get(&CacheKey::new("http://localhost:8080/", "s=Batman", false))
            .unwrap();

        // Assert
        assert!(cached.is_none());
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_expired_entry_is_not_returned() {
        // Arrange
        let cache = memory_cache();
        let key = CacheKey::new(ENDPOINT, "s=Batman", false);
        cache
            .put(key.clone(), &sample_table(), Duration::from_millis(20))
            .unwrap();

        // Act
        std::thread::sleep(Duration::from_millis(50));
        let cached = cache.get(&key).unwrap();

        // Assert
        assert!(cached.is_none());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_zero_ttl_is_not_stored() {
        // Arrange
        let cache = memory_cache();

        // Act
        cache
            .put(
                CacheKey::new(ENDPOINT, "s=Batman", false),
                &sample_table(),
                Duration::ZERO,
            )
            .unwrap();

        // Assert
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_clear_drops_all_entries() {
        // Arrange
        let cache = memory_cache();
        for query in ["s=Batman", "s=Superman"] {
            cache
                .put(
                    CacheKey::new(ENDPOINT, query, false),
                    &sample_table(),
                    Duration::from_secs(60),
                )
                .unwrap();
        }

        // Act
        cache.clear().unwrap();

        // Assert
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_purge_expired_keeps_fresh_entries() {
        // Arrange
        let cache = memory_cache();
        cache
            .put(
                CacheKey::new(ENDPOINT, "s=Old", false),
                &sample_table(),
                Duration::from_millis(10),
            )
            .unwrap();
        cache
            .put(
                CacheKey::new(ENDPOINT, "s=New", false),
                &sample_table(),
                Duration::from_secs(60),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));

        // Act
        let removed = cache.purge_expired().unwrap();

        // Assert
        assert_eq!(removed, 1);
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_entries_survive_reopen() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let key = CacheKey::new(ENDPOINT, "s=Batman&y=1989", false);
        SqliteCache::open(dir.path())
            .unwrap()
            .put(key.clone(), &sample_table(), Duration::from_secs(60))
            .unwrap();

        // Act
        let reopened = SqliteCache::open(dir.path()).unwrap();

        // Assert
        assert_eq!(reopened.get(&key).unwrap(), Some(sample_table()));
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        // Arrange
        let cache = memory_cache();
        cache
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO search_cache (endpoint, query, detail, table_json, expires_at)
                 VALUES (?1, 's=x', 0, 'not json', ?2)",
                rusqlite::params![ENDPOINT, i64::MAX],
            )
            .unwrap();

        // Act
        let result = cache.get(&CacheKey::new(ENDPOINT, "s=x", false));

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_expiry_millis_saturates() {
        // Arrange & Act & Assert
        assert_eq!(expiry_millis(1_000, Duration::from_secs(1)), 2_000);
        assert_eq!(expiry_millis(1_000, Duration::MAX), i64::MAX);
    }
}

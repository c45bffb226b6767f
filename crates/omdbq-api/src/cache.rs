//! Result table cache abstraction and the in-memory implementation.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

use super::table::ResultTable;

/// Cache key: endpoint, raw query fragment and the detail-mode flag.
///
/// The endpoint keeps tables fetched from different base URLs apart when a
/// persistent cache outlives a config change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Base URL the table was fetched from.
    pub endpoint: String,
    /// Query fragment as passed to the client.
    pub query: String,
    /// Whether rows were expanded with title details.
    pub detail: bool,
}

impl CacheKey {
    /// Creates a key.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, query: impl Into<String>, detail: bool) -> Self {
        Self {
            endpoint: endpoint.into(),
            query: query.into(),
            detail,
        }
    }
}

/// Storage for finished result tables.
///
/// Implementations must never return an entry past its TTL, and must treat
/// a zero TTL as "do not store".
#[allow(clippy::module_name_repetitions)]
pub trait TableCache: Debug + Send + Sync {
    /// Returns the cached table for `key` if present and fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &CacheKey) -> Result<Option<ResultTable>>;

    /// Stores `table` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn put(&self, key: CacheKey, table: &ResultTable, ttl: Duration) -> Result<()>;

    /// Drops every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn clear(&self) -> Result<()>;
}

#[derive(Debug)]
struct MemoryEntry {
    table: ResultTable,
    /// `None` when `now + ttl` overflows `Instant`.
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Process-local cache. Expired entries are evicted when read.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, MemoryEntry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, fresh or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CacheKey, MemoryEntry>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))
    }
}

impl TableCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<ResultTable>> {
        let mut entries = self.lock()?;
        let now = Instant::now();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Ok(Some(entry.table.clone())),
            Some(_) => {
                entries.remove(key);
                tracing::debug!(query = %key.query, detail = key.detail, "Cache entry expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: CacheKey, table: &ResultTable, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let entry = MemoryEntry {
            table: table.clone(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.lock()?.insert(key, entry);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use tracing::subscriber::with_default;
    use tracing_mock::{expect, subscriber};

    use super::*;

    const ENDPOINT: &str = "http://www.omdbapi.com/";

    fn sample_table() -> ResultTable {
        serde_json::from_str(
            r#"{"columns":["Title"],"rows":[{"Title":"Batman"}],"total_results":1}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_put_then_get() {
        // Arrange
        let cache = MemoryCache::new();
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
    fn test_detail_flag_is_part_of_key() {
        // Arrange
        let cache = MemoryCache::new();
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
        let cache = MemoryCache::new();
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
    }

    #[test]
    fn test_zero_ttl_is_not_stored() {
        // Arrange
        let cache = MemoryCache::new();

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
    fn test_expired_entry_is_evicted() {
        // Arrange
        let cache = MemoryCache::new();
        let key = CacheKey::new(ENDPOINT, "s=Batman", false);
        cache
            .put(key.clone(), &sample_table(), Duration::from_millis(20))
            .unwrap();

        // Act
        std::thread::sleep(Duration::from_millis(50));
        let cached = cache.get(&key).unwrap();

        // Assert
        assert!(cached.is_none());
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[test]
    fn test_clear_drops_all_entries() {
        // Arrange
        let cache = MemoryCache::new();
        for query in ["s=Batman", "s=Superman", "s=Alien"] {
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
    fn test_huge_ttl_never_expires() {
        // Arrange
        let cache = MemoryCache::new();
        let key = CacheKey::new(ENDPOINT, "s=Batman", false);

        // Act
        cache.put(key.clone(), &sample_table(), Duration::MAX).unwrap();

        // Assert
        assert!(cache.get(&key).unwrap().is_some());
    }

    #[test]
    fn test_expiry_is_logged() {
        // Arrange
        let cache = MemoryCache::new();
        let key = CacheKey::new(ENDPOINT, "s=Batman", false);
        cache
            .put(key.clone(), &sample_table(), Duration::from_millis(1))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let (subscriber, handle) = subscriber::mock()
            .event(
                expect::event()
                    .at_level(tracing::Level::DEBUG)
                    .with_fields(expect::msg("Cache entry expired")),
            )
            .only()
            .run_with_handle();

        // Act
        with_default(subscriber, || {
            cache.get(&key).unwrap();
        });

        // Assert
        handle.assert_finished();
    }
}

//! `AppConfig` struct and TOML loading.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use omdbq_api::{DEFAULT_BASE_URL, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// OMDb endpoint settings.
    #[serde(default)]
    pub omdb: OmdbConfig,
    /// Retry policy settings.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// OMDb endpoint configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OmdbConfig {
    /// API key. `OMDB_API_KEY` takes precedence.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff factor in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// HTTP statuses that are retried.
    #[serde(default = "default_statuses")]
    pub statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            statuses: default_statuses(),
        }
    }
}

/// Where search results are cached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local; gone when the command exits.
    Memory,
    /// `SQLite` file in the data directory.
    #[default]
    Sqlite,
}

/// Result cache configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache backend.
    #[serde(default)]
    pub backend: CacheBackend,
    /// Time-to-live in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_base_url() -> String {
    String::from(DEFAULT_BASE_URL)
}

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries()
}

fn default_backoff_ms() -> u64 {
    u64::try_from(RetryPolicy::default().backoff().as_millis()).unwrap_or(u64::MAX)
}

fn default_statuses() -> Vec<u16> {
    RetryPolicy::default().statuses().to_vec()
}

const fn default_ttl_secs() -> u64 {
    omdbq_api::DEFAULT_CACHE_TTL.as_secs()
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Builds the client retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.backoff_ms),
            self.retry.statuses.clone(),
        )
    }

    /// Cache time-to-live.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_config() {
        // Arrange & Act
        let config = AppConfig::default();

        // Assert
        assert!(config.omdb.api_key.is_none());
        assert_eq!(config.omdb.base_url, "http://www.omdbapi.com/");
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        // Arrange
        let config = AppConfig {
            omdb: OmdbConfig {
                api_key: Some(String::from("abc123")),
                base_url: String::from("http://localhost:8080/"),
            },
            retry: RetryConfig {
                max_retries: 2,
                backoff_ms: 100,
                statuses: vec![503],
            },
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                ttl_secs: 60,
            },
        };

        // Act
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        // Assert
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        // Arrange
        let path = Path::new("/tmp/omdbq_test_nonexistent_config.toml");

        // Act
        let config = AppConfig::load(path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[omdb]\napi_key = \"k\"\n\n[cache]\nbackend = \"memory\"\n").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config.omdb.api_key.as_deref(), Some("k"));
        assert_eq!(config.omdb.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_load_empty_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_invalid_backend_fails() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nbackend = \"redis\"\n").unwrap();

        // Act
        let result = AppConfig::load(&path);

        // Assert
        assert!(result.is_err());
    }
}

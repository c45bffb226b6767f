//! `OmdbClient` - OMDb API client implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::instrument;
use url::Url;

use super::api::LocalOmdbApi;
use super::cache::{CacheKey, MemoryCache, TableCache};
use super::error::OmdbError;
use super::query::SearchOptions;
use super::retry::RetryPolicy;
use super::table::ResultTable;
use super::types::{
    ErrorEnvelope, SearchEnvelope, TitleDetails, TitleEnvelope, failure_message,
};

/// Default base URL for the OMDb API.
pub const DEFAULT_BASE_URL: &str = "http://www.omdbapi.com/";

/// Maximum body length quoted in HTTP status errors.
const BODY_PREVIEW_LEN: usize = 200;

/// OMDb API client.
///
/// Holds the API key, retry policy and an injected result cache. Searches
/// are cached per (query, detail) key; title lookups are never cached.
#[allow(clippy::module_name_repetitions)]
pub struct OmdbClient {
    /// HTTP client.
    http_client: Client,
    /// Base URL for API requests.
    base_url: Url,
    /// API key sent as `apikey`.
    api_key: String,
    /// Retry policy for server-class failures.
    retry: RetryPolicy,
    /// Result table cache.
    cache: Arc<dyn TableCache>,
}

impl fmt::Debug for OmdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OmdbClient")
            .field("base_url", &self.base_url.as_str())
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Builder for `OmdbClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct OmdbClientBuilder {
    base_url: Option<Url>,
    api_key: Option<String>,
    user_agent: Option<String>,
    retry: RetryPolicy,
    cache: Option<Arc<dyn TableCache>>,
}

impl OmdbClientBuilder {
    /// Creates a new builder.
    fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            user_agent: None,
            retry: RetryPolicy::default(),
            cache: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the retry count (default: 5).
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry = RetryPolicy::new(
            max_retries,
            self.retry.backoff(),
            self.retry.statuses().to_vec(),
        );
        self
    }

    /// Sets the backoff factor (default: 250ms).
    #[must_use]
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.retry = RetryPolicy::new(
            self.retry.max_retries(),
            backoff,
            self.retry.statuses().to_vec(),
        );
        self
    }

    /// Sets the statuses that are retried (default: 500, 502, 503, 504).
    #[must_use]
    pub fn retry_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.retry = RetryPolicy::new(
            self.retry.max_retries(),
            self.retry.backoff(),
            statuses.into(),
        );
        self
    }

    /// Replaces the whole retry policy.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Injects the result cache (default: a fresh [`MemoryCache`]).
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn TableCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `api_key` is not set or empty.
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<OmdbClient> {
        let api_key = self.api_key.context("api_key is required")?;
        if api_key.trim().is_empty() {
            anyhow::bail!("api_key must not be empty");
        }
        let user_agent = self.user_agent.context("user_agent is required")?;

        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            let result = Url::parse(DEFAULT_BASE_URL);
            result.context("invalid default base URL")?
        };

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new()) as Arc<dyn TableCache>);

        Ok(OmdbClient {
            http_client,
            base_url,
            api_key,
            retry: self.retry,
            cache,
        })
    }
}

impl OmdbClient {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> OmdbClientBuilder {
        OmdbClientBuilder::new()
    }

    /// Drops every cached search result.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend cannot be written.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear().context("failed to clear result cache")
    }

    /// The retry policy in effect.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Builds `{base}?apikey={key}&{query}`.
    fn search_url(&self, query: &str) -> Url {
        let mut url = self.base_url.clone();
        let mut params = format!("apikey={}", self.api_key);
        if !query.is_empty() {
            params.push('&');
            params.push_str(query);
        }
        url.set_query(Some(&params));
        url
    }

    /// Builds `{base}?apikey={key}&i={id}`.
    fn title_url(&self, imdb_id: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.api_key)
            .append_pair("i", imdb_id);
        url
    }

    /// Sends a GET request and returns the body of a successful response.
    ///
    /// Retries statuses in the retry policy, and connection failures, up to
    /// `max_retries` times. Other non-success statuses fail immediately.
    #[instrument(skip_all, fields(operation = operation))]
    async fn get_body(&self, url: Url, operation: &str) -> Result<String, OmdbError> {
        let mut retries = 0u32;
        loop {
            tracing::debug!(path = url.path(), retries, "OMDb API request");

            let send_result = self.http_client.get(url.clone()).send().await;
            let response = match send_result {
                Ok(r) => r,
                Err(e)
                    if (e.is_connect() || e.is_timeout())
                        && retries < self.retry.max_retries() =>
                {
                    retries = retries.saturating_add(1);
                    let delay = self.retry.delay_for(retries);
                    tracing::warn!(
                        retry = retries,
                        max_retries = self.retry.max_retries(),
                        delay_ms = delay.as_millis(),
                        error = %e.without_url(),
                        "OMDb API connection failed. Retrying..."
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(OmdbError::transport(operation, e)),
            };

            let status = response.status();

            if self.retry.is_retryable(status.as_u16()) {
                if retries >= self.retry.max_retries() {
                    return Err(OmdbError::RetriesExhausted {
                        operation: String::from(operation),
                        status: status.as_u16(),
                        retries,
                    });
                }
                retries = retries.saturating_add(1);
                let delay = RetryPolicy::retry_after(response.headers())
                    .unwrap_or_else(|| self.retry.delay_for(retries));
                tracing::warn!(
                    retry = retries,
                    max_retries = self.retry.max_retries(),
                    code = status.as_u16(),
                    delay_ms = delay.as_millis(),
                    "OMDb API server error. Retrying..."
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("<failed to read body>"));
                let message = serde_json::from_str::<ErrorEnvelope>(&body).map_or_else(
                    |_| {
                        let end = body.floor_char_boundary(BODY_PREVIEW_LEN);
                        String::from(body.get(..end).unwrap_or_default())
                    },
                    |envelope| envelope.error,
                );
                return Err(OmdbError::Status {
                    operation: String::from(operation),
                    status: status.as_u16(),
                    message,
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| OmdbError::transport(operation, e))?;
            tracing::debug!(body_len = body.len(), "Response body received");
            return Ok(body);
        }
    }

    /// Fetches and flattens one title record.
    async fn fetch_title(&self, imdb_id: &str) -> Result<TitleDetails, OmdbError> {
        let body = self.get_body(self.title_url(imdb_id), "title").await?;
        Self::parse_title_response(&body)
    }

    /// Expands every row with its title record.
    ///
    /// Rows are fetched one after another; the first failure aborts the
    /// whole expansion.
    async fn expand_details(&self, table: &mut ResultTable) -> Result<(), OmdbError> {
        let ids = table.imdb_ids();
        let total = ids.len();
        for (index, imdb_id) in ids.iter().enumerate() {
            tracing::debug!(row = index, total, %imdb_id, "Fetching title details");
            let details = self.fetch_title(imdb_id).await?;
            table.merge_row(index, details);
        }
        Ok(())
    }

    /// Parses a search response into a base-column table.
    pub(crate) fn parse_search_response(body: &str) -> Result<ResultTable, OmdbError> {
        let envelope: SearchEnvelope =
            serde_json::from_str(body).map_err(|e| OmdbError::decode("search", e))?;
        if let Some(message) = failure_message(&envelope.response, envelope.error.as_deref()) {
            return Err(OmdbError::Api(message));
        }
        let total_results = envelope
            .total_results
            .as_deref()
            .and_then(|s| s.parse::<u32>().ok());
        Ok(ResultTable::from_hits(envelope.search, total_results))
    }

    /// Parses a title response into scalar fields.
    pub(crate) fn parse_title_response(body: &str) -> Result<TitleDetails, OmdbError> {
        let envelope: TitleEnvelope =
            serde_json::from_str(body).map_err(|e| OmdbError::decode("title", e))?;
        if let Some(message) = failure_message(&envelope.response, envelope.error.as_deref()) {
            return Err(OmdbError::Api(message));
        }
        Ok(envelope.into_details())
    }
}

impl LocalOmdbApi for OmdbClient {
    #[instrument(skip_all, fields(query = query, detail = options.detail))]
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<ResultTable, OmdbError> {
        let key = CacheKey::new(self.base_url.as_str(), query, options.detail);

        match self.cache.get(&key) {
            Ok(Some(table)) => {
                tracing::debug!(rows = table.len(), "Cache hit");
                return Ok(table);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Cache read failed, querying OMDb"),
        }

        let body = self.get_body(self.search_url(query), "search").await?;
        let mut table = Self::parse_search_response(&body)?;

        if options.detail {
            self.expand_details(&mut table).await?;
        }

        if let Err(e) = self.cache.put(key, &table, options.ttl) {
            tracing::warn!(error = %e, "Cache write failed");
        }

        Ok(table)
    }

    #[instrument(skip_all, fields(imdb_id = imdb_id))]
    async fn title(&self, imdb_id: &str) -> Result<TitleDetails, OmdbError> {
        self.fetch_title(imdb_id).await
    }
}

//! OMDb API client library for omdbq.
//!
//! Composes search queries, fetches results from the OMDb endpoint with
//! bounded retry, optionally expands every hit with its full title record,
//! and caches the flattened table per query.

mod api;
/// Result table caching.
pub mod cache;
mod client;
mod error;
mod query;
mod retry;
mod table;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalOmdbApi, OmdbApi};
pub use cache::{CacheKey, MemoryCache, TableCache};
#[allow(clippy::module_name_repetitions)]
pub use client::{DEFAULT_BASE_URL, OmdbClient, OmdbClientBuilder};
pub use error::{ErrorKind, OmdbError};
pub use query::{DEFAULT_CACHE_TTL, MediaType, SearchOptions, SearchQuery, is_imdb_id};
pub use retry::RetryPolicy;
pub use table::{BASE_COLUMNS, ResultTable, Row};
pub use types::{DETAIL_SKIPPED_FIELDS, TitleDetails};

//! Search query composition and per-call search options.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Default time-to-live for cached search results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// IMDb title IDs: `tt` followed by at least seven digits.
#[allow(clippy::expect_used)]
static IMDB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tt\d{7,}$").expect("failed to compile IMDb ID regex"));

/// Returns `true` if `id` looks like an IMDb title ID (e.g. `tt0372784`).
#[must_use]
pub fn is_imdb_id(id: &str) -> bool {
    IMDB_ID_RE.is_match(id)
}

/// OMDb `type` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Feature films.
    Movie,
    /// TV series.
    Series,
    /// Single episodes.
    Episode,
}

impl MediaType {
    /// Returns the OMDb parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Episode => "episode",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for a search query fragment (`s=...&type=...&y=...&page=...`).
///
/// The client accepts any fragment; this type only makes the common
/// title/type/year/page combination convenient and URL-safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    title: String,
    media_type: Option<MediaType>,
    year: Option<u16>,
    page: Option<u32>,
}

impl SearchQuery {
    /// Creates a query searching for `title`.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            media_type: None,
            year: None,
            page: None,
        }
    }

    /// Filters by media type.
    #[must_use]
    pub const fn media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    /// Filters by release year.
    #[must_use]
    pub const fn year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    /// Requests a result page (OMDb pages hold 10 hits).
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Renders the fragment passed to [`crate::LocalOmdbApi::search`].
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let title: String = url::form_urlencoded::byte_serialize(self.title.as_bytes()).collect();
        let mut query = format!("s={title}");
        if let Some(media_type) = self.media_type {
            query.push_str(&format!("&type={media_type}"));
        }
        if let Some(year) = self.year {
            query.push_str(&format!("&y={year}"));
        }
        if let Some(page) = self.page {
            query.push_str(&format!("&page={page}"));
        }
        query
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Per-call search options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Expand every hit with its full title record.
    pub detail: bool,
    /// How long the finished table stays cached. Zero disables caching.
    pub ttl: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            detail: false,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl SearchOptions {
    /// Enables or disables detail expansion.
    #[must_use]
    pub const fn detail(mut self, detail: bool) -> Self {
        self.detail = detail;
        self
    }

    /// Sets the cache time-to-live.
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

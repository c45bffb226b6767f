//! `OmdbApi` trait definition.
#![allow(clippy::future_not_send)]

use super::error::OmdbError;
use super::query::SearchOptions;
use super::table::ResultTable;
use super::types::TitleDetails;

/// OMDb API trait.
///
/// Abstracts API operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(OmdbApi: Send)]
pub trait LocalOmdbApi {
    /// Runs a search for a raw query fragment (e.g. `s=Batman&type=movie`).
    ///
    /// With `options.detail` set, every hit is expanded with its full
    /// title record. Results are served from the cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns [`OmdbError::Api`] when OMDb reports a failure (e.g.
    /// "Movie not found!"), and a request-kind error on transport
    /// failures or exhausted retries.
    async fn search(&self, query: &str, options: &SearchOptions)
    -> Result<ResultTable, OmdbError>;

    /// Fetches the full title record for an IMDb ID.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`LocalOmdbApi::search`].
    async fn title(&self, imdb_id: &str) -> Result<TitleDetails, OmdbError>;
}

//! OMDb response envelopes.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Fields of a title record that are never merged into a result row.
///
/// `Ratings` is a nested list and `Response` is the envelope status flag.
pub const DETAIL_SKIPPED_FIELDS: &[&str] = &["Ratings", "Response"];

/// Scalar fields of a full title record (`i=` lookup), rendered as strings.
pub type TitleDetails = BTreeMap<String, String>;

/// Value of the `Response` field on success.
const RESPONSE_TRUE: &str = "True";

/// Fallback when OMDb flags a failure without an `Error` text.
const UNKNOWN_ERROR: &str = "unknown OMDb error";

/// Envelope of a search (`s=`) response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchEnvelope {
    /// `"True"` or `"False"`.
    #[serde(rename = "Response")]
    pub response: String,
    /// Failure text when `response` is `"False"`.
    #[serde(rename = "Error")]
    pub error: Option<String>,
    /// Search hits.
    #[serde(rename = "Search", default)]
    pub search: Vec<SearchHit>,
    /// Total hit count across all pages (a decimal string upstream).
    #[serde(rename = "totalResults")]
    pub total_results: Option<String>,
}

/// A single search hit.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub(crate) struct SearchHit {
    /// Title.
    #[serde(rename = "Title", default)]
    pub title: String,
    /// Release year or year range (e.g. `2005`, `2011–2019`).
    #[serde(rename = "Year", default)]
    pub year: String,
    /// IMDb ID.
    #[serde(rename = "imdbID", default)]
    pub imdb_id: String,
    /// `movie`, `series` or `episode`.
    #[serde(rename = "Type", default)]
    pub kind: String,
    /// Poster URL or `N/A`.
    #[serde(rename = "Poster", default)]
    pub poster: String,
}

/// Envelope of a title (`i=`) response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TitleEnvelope {
    /// `"True"` or `"False"`.
    #[serde(rename = "Response")]
    pub response: String,
    /// Failure text when `response` is `"False"`.
    #[serde(rename = "Error")]
    pub error: Option<String>,
    /// Every other field of the record.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Envelope used only to pull the `Error` text out of non-2xx bodies.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(rename = "Error")]
    pub error: String,
}

/// Returns the upstream failure text when `response` is not `"True"`.
pub(crate) fn failure_message(response: &str, error: Option<&str>) -> Option<String> {
    if response == RESPONSE_TRUE {
        return None;
    }
    Some(String::from(error.unwrap_or(UNKNOWN_ERROR)))
}

impl TitleEnvelope {
    /// Flattens the record into string cells.
    ///
    /// Strings are kept as-is, numbers and booleans are formatted, and
    /// nulls, lists, objects and [`DETAIL_SKIPPED_FIELDS`] are dropped.
    pub(crate) fn into_details(self) -> TitleDetails {
        self.fields
            .into_iter()
            .filter(|(key, _)| !DETAIL_SKIPPED_FIELDS.contains(&key.as_str()))
            .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key, v)))
            .collect()
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

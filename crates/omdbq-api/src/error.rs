//! OMDb client error type.

/// Broad failure category of an [`OmdbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport or HTTP-level failure.
    Request,
    /// OMDb answered with `"Response": "False"`.
    Api,
}

/// Errors returned by the OMDb client.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum OmdbError {
    /// The request could not be sent or the body could not be read.
    #[error("OMDb {operation} request failed")]
    Transport {
        /// Operation label (`search`, `title`).
        operation: String,
        /// Underlying client error, stripped of the request URL.
        #[source]
        source: reqwest::Error,
    },

    /// A retryable status persisted through every retry.
    #[error("OMDb {operation} request failed with HTTP {status} after {retries} retries")]
    RetriesExhausted {
        /// Operation label.
        operation: String,
        /// Last HTTP status received.
        status: u16,
        /// Number of retries performed.
        retries: u32,
    },

    /// A non-retryable, non-success HTTP status.
    #[error("OMDb {operation} request failed (HTTP {status}): {message}")]
    Status {
        /// Operation label.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Upstream `Error` text, or a body preview.
        message: String,
    },

    /// The response body was not a valid OMDb envelope.
    #[error("failed to decode OMDb {operation} response")]
    Decode {
        /// Operation label.
        operation: String,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// OMDb reported a logical failure, e.g. "Movie not found!".
    #[error("{0}")]
    Api(String),
}

impl OmdbError {
    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(_) => ErrorKind::Api,
            Self::Transport { .. }
            | Self::RetriesExhausted { .. }
            | Self::Status { .. }
            | Self::Decode { .. } => ErrorKind::Request,
        }
    }

    /// Returns the upstream message for [`OmdbError::Api`].
    #[must_use]
    pub fn api_message(&self) -> Option<&str> {
        match self {
            Self::Api(message) => Some(message),
            _ => None,
        }
    }

    pub(crate) fn transport(operation: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            operation: String::from(operation),
            source: source.without_url(),
        }
    }

    pub(crate) fn decode(operation: &str, source: serde_json::Error) -> Self {
        Self::Decode {
            operation: String::from(operation),
            source,
        }
    }
}

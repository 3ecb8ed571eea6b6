//! Error types for index selection, querying and tailing.

use thiserror::Error;

/// Broad classes of failure, used by the binary to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operator input or environment is wrong (dates, patterns, indices).
    Configuration,
    /// The search backend could not be reached or answered with an error.
    Backend,
    /// A returned document is corrupt.
    Document,
    /// Local I/O failed (writing output lines).
    Io,
}

/// Errors that can occur while selecting indices, querying or tailing.
#[derive(Debug, Error)]
pub enum SearchError {
    /// No `YYYY<sep>MM<sep>DD` date could be extracted from the input.
    #[error("failed to extract date from '{input}'")]
    InvalidDate {
        /// The string that was searched for a date.
        input: String,
    },

    /// The index pattern is not a valid regular expression.
    #[error("invalid index pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// No index name matched the pattern (or the requested date range).
    #[error("no index matches pattern '{pattern}'")]
    NoMatchingIndex {
        /// The pattern that was used for selection.
        pattern: String,
    },

    /// The backend URL cannot be parsed.
    #[error("invalid backend url '{url}': {reason}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The backend answered with an error status or an unexpected body.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A hit's source is not a JSON object.
    #[error("malformed document {id}: {reason}")]
    MalformedDocument {
        /// Document id.
        id: String,
        /// Why the document was rejected.
        reason: String,
    },

    /// A hit has no string value in the timestamp field.
    #[error("document {id} has no string timestamp field '{field}'")]
    MissingTimestamp {
        /// Document id.
        id: String,
        /// Name of the timestamp field.
        field: String,
    },

    /// A timestamp value could not be parsed as RFC 3339.
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// The raw timestamp value.
        value: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Creates a `Backend` error with a message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates an `InvalidDate` error for the given input.
    #[must_use]
    pub fn invalid_date(input: impl Into<String>) -> Self {
        Self::InvalidDate {
            input: input.into(),
        }
    }

    /// Returns the broad class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDate { .. }
            | Self::InvalidPattern { .. }
            | Self::NoMatchingIndex { .. }
            | Self::InvalidUrl { .. } => ErrorKind::Configuration,
            Self::Backend { .. } | Self::Http(_) | Self::Serialization(_) => ErrorKind::Backend,
            Self::MalformedDocument { .. }
            | Self::MissingTimestamp { .. }
            | Self::InvalidTimestamp { .. } => ErrorKind::Document,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

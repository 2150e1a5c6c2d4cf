//! Error types shared across the crate.
//!
//! [`ResolveError`] is the taxonomy a resolution can end in. It is a plain
//! value (cloneable, comparable) so a gallery can keep the last failure next
//! to the last good locator. [`ConfigError`] covers descriptor validation.

use thiserror::Error;

use crate::path::PathError;

/// Why a single resolution attempt failed. Every variant is recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The endpoint could not be reached, timed out, or answered with
    /// something that is not JSON.
    #[error("source '{source_id}': network failure: {message}")]
    Network { source_id: String, message: String },

    /// The envelope status field reported failure.
    #[error("source '{source_id}': {message}")]
    UpstreamStatus { source_id: String, message: String },

    /// The envelope reported success but no non-blank string sits at the path.
    #[error("source '{source_id}': no string value at '{path}'")]
    Extraction { source_id: String, path: String },
}

impl ResolveError {
    pub fn source_id(&self) -> &str {
        match self {
            ResolveError::Network { source_id, .. }
            | ResolveError::UpstreamStatus { source_id, .. }
            | ResolveError::Extraction { source_id, .. } => source_id,
        }
    }

    /// Short label for notification titles and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Network { .. } => "network",
            ResolveError::UpstreamStatus { .. } => "upstream",
            ResolveError::Extraction { .. } => "extraction",
        }
    }
}

/// A source definition (config file, saved row, built-in table) is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source id must be non-empty with no surrounding whitespace")]
    EmptyId,

    #[error("source '{id}': invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        id: String,
        endpoint: String,
        reason: String,
    },

    #[error("source '{id}': structured mode requires an extraction path")]
    MissingPath { id: String },

    #[error("source '{id}': raw mode does not take an extraction path")]
    UnexpectedPath { id: String },

    #[error("source '{id}': {source}")]
    Path {
        id: String,
        #[source]
        source: PathError,
    },

    #[error("duplicate source id '{0}'")]
    DuplicateId(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

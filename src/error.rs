//! Error definitions for loading and addressing configuration.

use thiserror::Error;

/// Errors raised while resolving a path string against a tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A segment of the path does not exist in the tree.
    #[error("Path not found: {path}")]
    NotFound { path: String },

    /// The path string is not well formed.
    #[error("Invalid path '{path}': {reason}")]
    Syntax { path: String, reason: String },
}

/// Errors reported by an HTTP collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request could not be sent or the body could not be read.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Transport-independent failure (used by non-reqwest fetchers).
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while loading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The source answered with a non-success status.
    #[error("{url} could not be loaded: {status}")]
    Load { url: String, status: u16 },

    /// The response body is not valid JSON.
    #[error("{url} is not a valid JSON document: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request never produced a response.
    #[error("{url} could not be fetched: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// A fetched document could not be spliced into the tree.
    #[error(transparent)]
    Path(#[from] PathError),
}

impl ConfigError {
    /// URL of the document the error relates to, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            ConfigError::Load { url, .. }
            | ConfigError::Parse { url, .. }
            | ConfigError::Fetch { url, .. } => Some(url.as_str()),
            ConfigError::Path(_) => None,
        }
    }
}

/// Result type for loading operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

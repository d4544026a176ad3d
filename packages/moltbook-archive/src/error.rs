//! Typed errors for the archive library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Extraction never produces
//! errors; a miss is an empty result.

use thiserror::Error;

/// Errors that can occur during reconciliation and scrape orchestration.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Fetching a page failed
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Storage rejected a row (uniqueness, non-null, non-empty...)
    #[error("constraint violation on {table}: {reason}")]
    Constraint { table: &'static str, reason: String },

    /// Record not found by key
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Scrape request rejected before any work was done
    #[error("invalid scrape job: {reason}")]
    InvalidJob { reason: String },

    /// Another job is pending or running
    #[error("a scrape job is already in progress")]
    JobInProgress,

    /// Job state machine violation
    #[error("invalid job transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ArchiveError {
    /// Wrap any error as a storage error.
    pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(e))
    }

    /// Storage error from a plain message.
    pub fn storage_msg(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into().into())
    }
}

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Remote API answered with an error
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Request timed out
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Page came back without markdown
    #[error("no markdown content returned for: {url}")]
    EmptyContent { url: String },
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

//! Error types for subwatch.

use thiserror::Error;

/// Common error type for subwatch.
#[derive(Error, Debug)]
pub enum SubwatchError {
    /// The item source is unreachable or its stream failed.
    ///
    /// A subscription loop that hits this error terminates permanently;
    /// the error is logged, never escalated to the process.
    #[error("source error: {0}")]
    Source(String),

    /// A single item lookup failed.
    ///
    /// Terminal for the watch attempting the fetch, invisible to the feed.
    #[error("item fetch error: {0}")]
    ItemFetch(String),

    /// The delivery endpoint no longer exists. Triggers one self-heal retry.
    #[error("endpoint gone")]
    EndpointGone,

    /// The destination channel no longer exists. Terminal for the feed.
    #[error("channel gone")]
    ChannelGone,

    /// The sink refused an endpoint operation. Terminal for the feed.
    #[error("insufficient privilege: {0}")]
    Forbidden(String),

    /// Any other delivery failure. Logged and swallowed per item.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Validation error for a subscription request.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for subwatch operations.
pub type Result<T> = std::result::Result<T, SubwatchError>;

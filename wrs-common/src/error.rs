//! Common error types for WRS

use thiserror::Error;

/// Common result type for WRS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across WRS services
#[derive(Error, Debug)]
pub enum Error {
    /// Stream source could not deliver a message
    #[error("Stream read error: {0}")]
    StreamRead(String),

    /// Rank store backend could not service an increment or query
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Requested key has no entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Drain or resource close exceeded its bounded timeout
    #[error("Shutdown timeout: {0}")]
    ShutdownTimeout(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error should be reported to a client as "not found"
    /// rather than as a server fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

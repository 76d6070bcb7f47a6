//! Unified error types for offcache.
//!
//! Variants group into the three failure kinds the engine reasons about:
//! network failures, store failures, and everything the caller got wrong.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the offcache engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Origin unreachable, or the fetch capability itself failed.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Origin response exceeded the configured byte limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A namespace handle outlived its namespace.
    #[error("STORE_ERROR: namespace not found: {0}")]
    NamespaceMissing(String),

    /// A stored entry could not be decoded.
    #[error("STORE_ERROR: corrupt entry: {0}")]
    Corrupt(String),

    /// Operation attempted from the wrong lifecycle state.
    #[error("LIFECYCLE_ERROR: {0}")]
    Lifecycle(String),
}

impl Error {
    /// Whether this failure came from the origin side.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTooLarge(_))
    }

    /// Whether this failure came from the cache store.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::MigrationFailed(_) | Error::NamespaceMissing(_) | Error::Corrupt(_)
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Network(msg) => (-32008, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::NamespaceMissing(name) => (-32002, format!("namespace not found: {name}")),
            Error::Corrupt(msg) => (-32002, msg.clone()),
            Error::Lifecycle(msg) => (-32013, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

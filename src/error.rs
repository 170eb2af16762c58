//! Error types for the cache engine.
//!
//! A single flat enum covers every tier: codec failures, local filesystem
//! faults, and remote object store faults. Every variant carries a
//! `String` message rather than the originating error type so that
//! `Error` itself can be `Clone` -- the single-flight fetch path shares
//! one outcome across every caller waiting on the same key.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    // =========================================================================
    // Codec Errors
    // =========================================================================
    #[error("codec produced no data: {0}")]
    NoDataAvailable(String),

    #[error("codec could not decode stored bytes: {0}")]
    DecodeFailed(String),

    // =========================================================================
    // Disk Tier Errors
    // =========================================================================
    #[error("local filesystem error: {0}")]
    LocalIo(String),

    // =========================================================================
    // Remote Tier Errors
    // =========================================================================
    #[error("remote transport error: {0}")]
    RemoteTransient(String),

    #[error("remote record not found")]
    RemoteUnknownRecord,

    #[error("remote store denied the write: {0}")]
    RemotePermission(String),

    // =========================================================================
    // Fetch Errors
    // =========================================================================
    #[error("fetch callback failed: {0}")]
    FetchFailed(String),

    #[error("fetch was cancelled")]
    Cancelled,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("invalid cache configuration: {0}")]
    Configuration(String),

    #[error("internal cache error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::LocalIo(err.to_string())
    }
}

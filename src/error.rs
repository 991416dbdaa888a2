//! Error types for the catalog.
//!
//! Each layer owns its error enum; `ApiError` is the umbrella surfaced to
//! collaborators.

use thiserror::Error;

/// Object store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or its schema could not be set up.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Binary codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },
}

/// Secondary (fallback) cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Fallback cache quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    #[error("Fallback cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image path errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

/// Top-level API error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Image(#[from] ImageError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

//! Error types for the response cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Decode Error Enum ==
/// Reasons a stored blob could not be turned back into a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Blob is shorter than the fixed header
    #[error("blob truncated: {0} bytes")]
    Truncated(usize),

    /// Blob does not start with the payload magic
    #[error("bad magic bytes")]
    BadMagic,

    /// Blob was written by a different codec version
    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    /// Body checksum does not match the header
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Body could not be deserialized
    #[error("malformed body: {0}")]
    Malformed(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Stored blob cannot be reconstituted
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Backing database cannot be opened, read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Caller passed a parameter tree that cannot be normalized
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Configuration value failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::StorageUnavailable(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidParameters(_) | CacheError::Config(_) => StatusCode::BAD_REQUEST,
            CacheError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let resp = CacheError::InvalidParameters("nan".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = CacheError::StorageUnavailable("locked".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = CacheError::from(DecodeError::BadMagic).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_sqlite_error_is_storage_unavailable() {
        let err: CacheError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, CacheError::StorageUnavailable(_)));
    }
}

//! Error types.

use http::StatusCode;
use thiserror::Error;

/// Transport-level failures produced by an [`crate::HttpClient`] backend.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The request exceeded the client timeout.
    #[error("request timed out")]
    Timeout,
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),
    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by [`crate::DriveClient`] operations.
#[derive(Debug, Error)]
pub enum DriveError {
    /// The remote object does not exist (HTTP 404, or an empty lookup).
    #[error("object not found")]
    NotFound,
    /// The Drive API rejected the request.
    #[error("drive api error: {status}: {message}")]
    Api {
        /// HTTP status of the failed call.
        status: StatusCode,
        /// Response body, truncated, for the log line.
        message: String,
    },
    /// Token acquisition or refresh failed.
    #[error("authorization failed: {0}")]
    Auth(String),
    /// The transport failed before a response was produced.
    #[error(transparent)]
    Http(#[from] HttpClientError),
    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DriveError {
    /// Whether this error denotes a missing object rather than a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

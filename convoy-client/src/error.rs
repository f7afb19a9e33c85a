//! Error types for the release client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the remote CI/SCM platform
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Remote API answered with a non-2xx status
    #[error("API error (status {status}) {url}: {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Requested URL, without credentials
        url: String,
        /// Raw response body
        message: String,
    },

    /// Response body could not be decoded
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The remote side has no such resource (yet)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The client was configured or called with unusable input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create an API error from status code, URL and body
    pub fn api_error(status: u16, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = ClientError::api_error(404, "http://x/api/v4/projects/1", "missing");
        assert!(not_found.is_not_found());
        assert!(not_found.is_client_error());

        let unavailable = ClientError::api_error(503, "http://x", "down");
        assert!(!unavailable.is_client_error());
        assert!(!unavailable.is_not_found());

        assert!(ClientError::NotFound("pipeline".into()).is_not_found());
    }

    #[test]
    fn test_api_error_message_includes_status() {
        let err = ClientError::api_error(401, "http://x/tags", "unauthorized");
        assert_eq!(
            err.to_string(),
            "API error (status 401) http://x/tags: unauthorized"
        );
    }
}

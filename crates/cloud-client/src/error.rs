//! Cloud client errors

use thiserror::Error;

/// Errors that can occur when interacting with the compute API
#[derive(Debug, Error)]
pub enum CloudError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Compute API returned an error
    #[error("Cloud API error: {0}")]
    Api(String),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Instance not found (already terminated and reaped, or never existed)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., malformed instance id)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CloudError {
    /// True for errors meaning the target no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

//! Compute API error types

use thiserror::Error;

/// Errors produced by the Strato Cloud compute API client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

impl ApiError {
    /// True when the API reported a 404 for the addressed resource.
    ///
    /// Callers use this to treat "already deleted" as success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// True for failures worth retrying at the transport layer:
    /// connection-level errors and server-side 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_discrimination() {
        let err = ApiError::NotFound {
            resource: "instance",
            id: "i-123".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_retryable());

        let err = ApiError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(!err.is_not_found());
        assert!(err.is_retryable());

        let err = ApiError::Api {
            status: 409,
            message: "conflict".to_string(),
        };
        assert!(!err.is_retryable());
    }
}

//! Provider-level error types

use stratoform_api::ApiError;
use stratoform_compute::ComputeError;
use thiserror::Error;

/// Errors surfaced by resource lifecycle operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Reconciliation failed: {0}")]
    Compute(#[from] ComputeError),

    /// Configuration-time failures, accumulated and reported together
    /// before any API call is made
    #[error("Invalid configuration: {}", messages.join("; "))]
    Validation { messages: Vec<String> },

    #[error("{resource} {id} reached ERROR status during {operation}")]
    ResourceErrored {
        resource: &'static str,
        id: String,
        operation: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ProviderError>;

//! Reconciliation error types

use std::time::Duration;
use stratoform_api::ApiError;
use thiserror::Error;

/// Errors produced while reconciling an instance toward its desired state
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("{waiting_for} did not reach the expected state within {waited:?} (last status: {})",
        last_status.as_deref().unwrap_or("unknown"))]
    Timeout {
        waiting_for: String,
        waited: Duration,
        last_status: Option<String>,
    },

    #[error("Instance {id} entered ERROR status during '{action}'")]
    ResourceUnavailable { id: String, action: String },

    #[error("Desired volume entry (device: {}) has neither a volume id nor a size",
        device.as_deref().unwrap_or("unset"))]
    UnresolvedVolume { device: Option<String> },

    #[error("Desired interface on subnet {subnet} has no resolved port id")]
    UnresolvedInterface { subnet: String },

    #[error("No network interface exists on subnet {subnet}")]
    NoInterfaceForSubnet { subnet: String },

    #[error("All network interfaces on subnet {subnet} are already claimed")]
    SubnetInterfacesExhausted { subnet: String },
}

impl ComputeError {
    /// True when the failure is the convergence-deadline kind, as opposed to
    /// a transport or remote-status failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ComputeError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ComputeError>;

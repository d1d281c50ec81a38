//! Stratoform provider layer
//!
//! Resource lifecycle operations for the Strato Cloud compute API, sitting
//! where a declarative-infrastructure provider's CRUD handlers would:
//!
//! - configuration and per-operation timeouts ([`config`])
//! - configuration-time validation, accumulated before any API call
//!   ([`validate`])
//! - create/read/update/delete flows per resource kind ([`resources`]),
//!   driving the reconciliation core in `stratoform-compute`
//!
//! Every operation re-fetches remote state before acting and returns the
//! refreshed model after acting; nothing is cached across invocations.

pub mod config;
pub mod error;
pub mod resources;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use stratoform_api::{ComputeApi, HttpComputeApi};

// Re-exports
pub use config::{OperationTimeouts, ProviderConfig};
pub use error::{ProviderError, Result};
pub use resources::{
    InstanceConfig, InstanceResource, KeypairConfig, KeypairResource, SnapshotConfig,
    SnapshotResource, VolumeConfig, VolumeResource,
};

/// Entry point bundling the resource surfaces over one API handle
pub struct StratoProvider {
    api: Arc<dyn ComputeApi>,
    timeouts: OperationTimeouts,
    poll_interval: Duration,
}

impl StratoProvider {
    /// Connect using the given provider configuration
    pub fn new(config: ProviderConfig) -> Self {
        let api: Arc<dyn ComputeApi> = Arc::new(HttpComputeApi::new(config.api));
        Self {
            api,
            timeouts: config.timeouts,
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Use an existing API handle (tests, alternative transports)
    pub fn with_api(api: Arc<dyn ComputeApi>, timeouts: OperationTimeouts) -> Self {
        Self {
            api,
            timeouts,
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn instances(&self) -> InstanceResource {
        InstanceResource::new(Arc::clone(&self.api), self.timeouts)
            .with_poll_interval(self.poll_interval)
    }

    pub fn volumes(&self) -> VolumeResource {
        VolumeResource::new(Arc::clone(&self.api), self.timeouts)
            .with_poll_interval(self.poll_interval)
    }

    pub fn snapshots(&self) -> SnapshotResource {
        SnapshotResource::new(Arc::clone(&self.api), self.timeouts)
            .with_poll_interval(self.poll_interval)
    }

    pub fn keypairs(&self) -> KeypairResource {
        KeypairResource::new(Arc::clone(&self.api))
    }
}

//! Resource lifecycle operations, one module per resource kind

pub mod instance;
pub mod keypair;
pub mod snapshot;
pub mod volume;

pub use instance::{InstanceConfig, InstanceResource};
pub use keypair::{KeypairConfig, KeypairResource};
pub use snapshot::{SnapshotConfig, SnapshotResource};
pub use volume::{VolumeConfig, VolumeResource};

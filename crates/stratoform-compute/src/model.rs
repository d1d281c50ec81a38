//! Desired-state descriptors for instance sub-resources
//!
//! These mirror the user's declared configuration. The live side of the diff
//! uses the wire models from `stratoform-api` directly.

use serde::{Deserialize, Serialize};

/// A volume the instance should have attached
///
/// After validation, every entry carries a volume id (attach existing
/// storage) xor a size (create new storage). Type and encryption key cannot
/// be changed on a live attachment; the diff engine turns such changes into
/// a detach followed by a fresh attach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredVolume {
    pub volume_id: Option<String>,

    pub size_gb: Option<i64>,

    #[serde(default)]
    pub delete_on_termination: bool,

    pub volume_type: Option<String>,

    pub encryption_key_id: Option<String>,

    pub device: Option<String>,

    /// Create the new volume from this snapshot
    pub snapshot_id: Option<String>,
}

impl DesiredVolume {
    /// Attach an existing volume by id
    pub fn existing(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: Some(volume_id.into()),
            ..Self::default()
        }
    }

    /// Create and attach a new volume of the given size
    pub fn new_with_size(size_gb: i64) -> Self {
        Self {
            size_gb: Some(size_gb),
            ..Self::default()
        }
    }

    pub fn with_delete_on_termination(mut self, value: bool) -> Self {
        self.delete_on_termination = value;
        self
    }

    pub fn with_size(mut self, size_gb: i64) -> Self {
        self.size_gb = Some(size_gb);
        self
    }

    pub fn with_volume_type(mut self, volume_type: impl Into<String>) -> Self {
        self.volume_type = Some(volume_type.into());
        self
    }
}

/// A network interface the instance should have attached
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredInterface {
    pub subnet_id: String,

    /// Resolved lazily against the live attachment list when unset
    pub port_id: Option<String>,

    pub fixed_ip: Option<String>,
}

impl DesiredInterface {
    pub fn on_subnet(subnet_id: impl Into<String>) -> Self {
        Self {
            subnet_id: subnet_id.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port_id: impl Into<String>) -> Self {
        self.port_id = Some(port_id.into());
        self
    }
}

//! Wire models for the Strato Cloud compute API
//!
//! Field casing follows the API's camelCase JSON. These are plain data
//! carriers; reconciliation semantics live in `stratoform-compute`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A compute instance as returned by `GET /compute/instances/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,

    pub name: String,

    /// Coarse instance status, uppercase wire string ("ACTIVE", "SHUTOFF", ...).
    /// Authoritative on the remote side; the local copy is a cache.
    pub status: String,

    /// Volumes currently attached, in API-reported order
    #[serde(default)]
    pub attached_volumes: Vec<VolumeAttachment>,

    /// Network interface attachments, in API-reported order
    #[serde(default)]
    pub interfaces: Vec<InterfaceAttachment>,

    /// Keypair injected at creation, if any
    pub key_name: Option<String>,

    pub created_at: Option<DateTime<Utc>>,
}

impl Instance {
    /// Find an attached volume by volume id
    pub fn attached_volume(&self, volume_id: &str) -> Option<&VolumeAttachment> {
        self.attached_volumes.iter().find(|v| v.volume_id == volume_id)
    }

    /// Find an interface attachment by port id
    pub fn interface(&self, port_id: &str) -> Option<&InterfaceAttachment> {
        self.interfaces.iter().find(|i| i.port_id == port_id)
    }
}

/// A volume attached to an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAttachment {
    pub volume_id: String,

    /// Device path inside the guest (e.g. "/dev/vdb")
    pub device: Option<String>,

    /// Whether the volume is deleted together with the instance
    #[serde(default)]
    pub delete_on_termination: bool,

    pub size_gb: i64,

    pub volume_type: Option<String>,

    /// Reference to the key used for at-rest encryption, if any
    pub encryption_key_id: Option<String>,

    /// Volume status wire string ("in-use", "available", ...)
    pub status: String,
}

/// A network interface attached to an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceAttachment {
    pub port_id: String,

    pub subnet_id: String,

    pub fixed_ip: Option<String>,

    pub status: Option<String>,
}

/// A block storage volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,

    pub name: Option<String>,

    pub size_gb: i64,

    pub volume_type: Option<String>,

    pub encryption_key_id: Option<String>,

    /// "available", "in-use", "creating", "error", ...
    pub status: String,

    pub created_at: Option<DateTime<Utc>>,
}

/// A point-in-time snapshot of a volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,

    pub name: Option<String>,

    pub volume_id: String,

    pub size_gb: i64,

    /// "available", "creating", "error", ...
    pub status: String,

    pub created_at: Option<DateTime<Utc>>,
}

/// An SSH keypair registered with the compute service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keypair {
    pub name: String,

    pub public_key: String,

    pub fingerprint: Option<String>,
}

/// Request body for instance creation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub name: String,

    pub flavor_id: String,

    pub image_id: Option<String>,

    pub key_name: Option<String>,

    /// Boot and additional volumes requested at creation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<CreateVolumeSpec>,

    /// Subnets to wire the instance into; the first becomes the primary
    /// interface and cannot be changed later
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<String>,
}

/// A volume requested as part of instance creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,

    pub delete_on_termination: bool,
}

/// Options for attaching an existing volume
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachVolumeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    pub delete_on_termination: bool,
}

/// Request body for volume creation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeRequest {
    pub name: Option<String>,

    pub size_gb: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

/// Request body for snapshot creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    pub name: Option<String>,

    pub volume_id: String,
}

/// Request body for keypair import
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportKeypairRequest {
    pub name: String,

    pub public_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_lookup_helpers() {
        let instance = Instance {
            id: "i-1".to_string(),
            name: "web-01".to_string(),
            status: "ACTIVE".to_string(),
            attached_volumes: vec![VolumeAttachment {
                volume_id: "v-1".to_string(),
                device: Some("/dev/vda".to_string()),
                delete_on_termination: true,
                size_gb: 50,
                volume_type: None,
                encryption_key_id: None,
                status: "in-use".to_string(),
            }],
            interfaces: vec![InterfaceAttachment {
                port_id: "p-1".to_string(),
                subnet_id: "s-1".to_string(),
                fixed_ip: Some("10.0.0.4".to_string()),
                status: Some("ACTIVE".to_string()),
            }],
            key_name: None,
            created_at: None,
        };

        assert!(instance.attached_volume("v-1").is_some());
        assert!(instance.attached_volume("v-2").is_none());
        assert_eq!(instance.interface("p-1").unwrap().subnet_id, "s-1");
    }

    #[test]
    fn test_instance_deserializes_with_missing_collections() {
        let json = r#"{"id":"i-1","name":"web","status":"BUILD"}"#;
        let instance: Instance = serde_json::from_str(json).unwrap();
        assert!(instance.attached_volumes.is_empty());
        assert!(instance.interfaces.is_empty());
    }
}

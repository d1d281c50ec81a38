//! Configuration-time validation
//!
//! All checks here run before any API call. Failures are accumulated and
//! reported together so the user sees every problem in one pass.

use stratoform_api::Instance;
use stratoform_compute::InstanceStatus;

use crate::error::{ProviderError, Result};
use crate::resources::instance::InstanceConfig;

/// Checks that hold for any instance configuration, create or update
pub fn validate_instance_config(config: &InstanceConfig) -> Result<()> {
    let mut messages = Vec::new();

    if config.name.is_empty() {
        messages.push("instance name must not be empty".to_string());
    }
    if !config.status.is_stable() {
        messages.push(format!(
            "desired status must be one of ACTIVE, SHUTOFF or SHELVED_OFFLOADED, got {}",
            config.status
        ));
    }

    for (n, volume) in config.volumes.iter().enumerate() {
        if volume.volume_id.is_some() && volume.snapshot_id.is_some() {
            messages.push(format!(
                "volume {}: volume_id conflicts with snapshot_id, set only one source",
                n
            ));
        }
        if volume.volume_id.is_none() && volume.size_gb.is_none() {
            messages.push(format!(
                "volume {}: set volume_id to attach existing storage or size_gb to create new storage",
                n
            ));
        }
        if let Some(size) = volume.size_gb {
            if size <= 0 {
                messages.push(format!("volume {}: size_gb must be positive, got {}", n, size));
            }
        }
    }

    finish(messages)
}

/// Checks that compare the new configuration against the live instance
pub fn validate_instance_update(current: &Instance, config: &InstanceConfig) -> Result<()> {
    let mut messages = Vec::new();

    for (n, volume) in config.volumes.iter().enumerate() {
        let Some(id) = volume.volume_id.as_deref() else {
            continue;
        };
        let Some(attached) = current.attached_volume(id) else {
            continue;
        };
        if let Some(size) = volume.size_gb {
            if size < attached.size_gb {
                messages.push(format!(
                    "volume {} ({}): size can only grow, {} GB -> {} GB is a shrink",
                    n, id, attached.size_gb, size
                ));
            }
        }
    }

    // The creation-time primary interface cannot be detached or moved.
    if let Some(primary) = current.interfaces.first() {
        let kept = config.interfaces.iter().any(|spec| {
            spec.subnet_id == primary.subnet_id
                && spec
                    .port_id
                    .as_deref()
                    .map(|p| p == primary.port_id)
                    .unwrap_or(true)
        });
        if !kept {
            messages.push(format!(
                "primary interface {} on subnet {} cannot be detached or moved",
                primary.port_id, primary.subnet_id
            ));
        }
    }

    finish(messages)
}

/// Desired status parsed from user configuration
pub fn parse_desired_status(s: &str) -> Result<InstanceStatus> {
    let status = InstanceStatus::parse(s);
    if status.is_stable() {
        Ok(status)
    } else {
        Err(ProviderError::Validation {
            messages: vec![format!(
                "'{}' is not an addressable instance status (use active, stopped or shelved)",
                s
            )],
        })
    }
}

fn finish(messages: Vec<String>) -> Result<()> {
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation { messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratoform_compute::{DesiredInterface, DesiredVolume};

    fn base_config() -> InstanceConfig {
        InstanceConfig {
            name: "web-01".to_string(),
            flavor_id: "small".to_string(),
            image_id: Some("ubuntu-24.04".to_string()),
            key_name: None,
            status: InstanceStatus::Active,
            volumes: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let mut config = base_config();
        config.volumes.push(DesiredVolume::existing("v-1"));
        config.volumes.push(DesiredVolume::new_with_size(20));
        assert!(validate_instance_config(&config).is_ok());
    }

    #[test]
    fn test_all_problems_reported_together() {
        let mut config = base_config();
        config.name.clear();
        config.volumes.push(DesiredVolume::default()); // no source at all
        let mut conflicted = DesiredVolume::existing("v-1");
        conflicted.snapshot_id = Some("snap-1".to_string());
        config.volumes.push(conflicted);

        let err = validate_instance_config(&config).unwrap_err();
        match err {
            ProviderError::Validation { messages } => assert_eq!(messages.len(), 3),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_shrink_is_rejected_on_update() {
        use stratoform_api::{Instance, VolumeAttachment};

        let current = Instance {
            id: "i-1".to_string(),
            name: "web-01".to_string(),
            status: "ACTIVE".to_string(),
            attached_volumes: vec![VolumeAttachment {
                volume_id: "v-1".to_string(),
                device: None,
                delete_on_termination: false,
                size_gb: 100,
                volume_type: None,
                encryption_key_id: None,
                status: "in-use".to_string(),
            }],
            interfaces: Vec::new(),
            key_name: None,
            created_at: None,
        };
        let mut config = base_config();
        config.volumes.push(DesiredVolume::existing("v-1").with_size(50));

        let err = validate_instance_update(&current, &config).unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
    }

    #[test]
    fn test_primary_interface_must_stay() {
        use stratoform_api::{Instance, InterfaceAttachment};

        let current = Instance {
            id: "i-1".to_string(),
            name: "web-01".to_string(),
            status: "ACTIVE".to_string(),
            attached_volumes: Vec::new(),
            interfaces: vec![InterfaceAttachment {
                port_id: "p-1".to_string(),
                subnet_id: "s-1".to_string(),
                fixed_ip: None,
                status: None,
            }],
            key_name: None,
            created_at: None,
        };

        let mut config = base_config();
        config.interfaces.push(DesiredInterface::on_subnet("s-2"));
        let err = validate_instance_update(&current, &config).unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));

        let mut config = base_config();
        config.interfaces.push(DesiredInterface::on_subnet("s-1"));
        assert!(validate_instance_update(&current, &config).is_ok());
    }

    #[test]
    fn test_desired_status_parsing() {
        assert_eq!(parse_desired_status("active").unwrap(), InstanceStatus::Active);
        assert_eq!(parse_desired_status("SHUTOFF").unwrap(), InstanceStatus::Stopped);
        assert!(parse_desired_status("ERROR").is_err());
        assert!(parse_desired_status("RESIZE").is_err());
    }
}

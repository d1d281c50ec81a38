//! Instance lifecycle operations
//!
//! One reconciliation pass per operation: current state is always re-fetched
//! from the API before acting, so each pass is correct regardless of how
//! stale the previous local view was.

use std::sync::Arc;
use std::time::Duration;

use stratoform_api::{
    AttachVolumeOptions, ComputeApi, CreateInstanceRequest, CreateVolumeSpec, Instance,
};
use stratoform_compute::{
    DesiredInterface, DesiredVolume, InstanceStatus, OperationDeadline, Reconciler,
    diff_interfaces, diff_volumes, resolve_interface_ids,
};

use crate::config::OperationTimeouts;
use crate::error::{ProviderError, Result};
use crate::validate;

/// Declared configuration for one instance
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub name: String,

    pub flavor_id: String,

    pub image_id: Option<String>,

    pub key_name: Option<String>,

    /// Desired rest state; must be Active, Stopped or Shelved
    pub status: InstanceStatus,

    pub volumes: Vec<DesiredVolume>,

    /// The first entry becomes the creation-time primary interface
    pub interfaces: Vec<DesiredInterface>,
}

/// CRUD surface for instances
pub struct InstanceResource {
    reconciler: Reconciler,
    timeouts: OperationTimeouts,
}

impl InstanceResource {
    pub fn new(api: Arc<dyn ComputeApi>, timeouts: OperationTimeouts) -> Self {
        Self {
            reconciler: Reconciler::new(api),
            timeouts,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.reconciler = self.reconciler.with_poll_interval(interval);
        self
    }

    /// Create the instance, wait for it to boot, attach declared existing
    /// volumes, and converge to the desired rest state, all within the
    /// create timeout.
    pub async fn create(&self, config: &InstanceConfig) -> Result<Instance> {
        validate::validate_instance_config(config)?;
        let deadline = OperationDeadline::after(self.timeouts.create);

        let request = CreateInstanceRequest {
            name: config.name.clone(),
            flavor_id: config.flavor_id.clone(),
            image_id: config.image_id.clone(),
            key_name: config.key_name.clone(),
            volumes: config
                .volumes
                .iter()
                .filter(|v| v.volume_id.is_none())
                .map(|v| CreateVolumeSpec {
                    volume_id: None,
                    size_gb: v.size_gb,
                    snapshot_id: v.snapshot_id.clone(),
                    delete_on_termination: v.delete_on_termination,
                })
                .collect(),
            subnets: config
                .interfaces
                .iter()
                .map(|i| i.subnet_id.clone())
                .collect(),
        };

        let created = self.reconciler.api().create_instance(&request).await?;
        tracing::info!("created instance {} ({})", created.id, config.name);

        let accepted = [InstanceStatus::Active, InstanceStatus::Error];
        let instance = self
            .reconciler
            .wait_for_instance_status(&created.id, &accepted, deadline.remaining())
            .await?;
        if InstanceStatus::parse(&instance.status) == InstanceStatus::Error {
            return Err(ProviderError::ResourceErrored {
                resource: "instance",
                id: created.id,
                operation: "create",
            });
        }

        for spec in &config.volumes {
            if let Some(volume_id) = spec.volume_id.as_deref() {
                let opts = AttachVolumeOptions {
                    device: spec.device.clone(),
                    delete_on_termination: spec.delete_on_termination,
                };
                self.reconciler
                    .attach_volume(&instance.id, volume_id, &opts, deadline.remaining())
                    .await?;
            }
        }

        let instance = self
            .reconciler
            .converge_status(&instance, &config.status, deadline.remaining())
            .await?;
        Ok(instance)
    }

    /// Fetch the instance; a 404 means it no longer exists
    pub async fn read(&self, id: &str) -> Result<Option<Instance>> {
        match self.reconciler.api().get_instance(id).await {
            Ok(instance) => Ok(Some(instance)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reconcile the live instance toward the new configuration: resolve
    /// interface ids, diff sub-resources, apply the operation lists in
    /// order, then walk the status transition table. The whole pass is
    /// bounded by the update timeout.
    pub async fn update(&self, id: &str, config: &InstanceConfig) -> Result<Instance> {
        validate::validate_instance_config(config)?;
        let deadline = OperationDeadline::after(self.timeouts.update);
        let current = self.reconciler.api().get_instance(id).await?;
        validate::validate_instance_update(&current, config)?;

        let mut interfaces: Vec<DesiredInterface> = config.interfaces.clone();
        resolve_interface_ids(&mut interfaces, &current.interfaces)?;

        let volume_ops = diff_volumes(&config.volumes, &current.attached_volumes)?;
        self.reconciler
            .apply_volume_ops(id, &volume_ops, deadline.remaining())
            .await?;

        let interface_ops = diff_interfaces(&interfaces, &current.interfaces)?;
        self.reconciler
            .apply_interface_ops(id, &interface_ops, deadline.remaining())
            .await?;

        let refreshed = self.reconciler.api().get_instance(id).await?;
        let instance = self
            .reconciler
            .converge_status(&refreshed, &config.status, deadline.remaining())
            .await?;
        Ok(instance)
    }

    /// Delete the instance and wait until an existence check reports 404
    pub async fn delete(&self, id: &str) -> Result<()> {
        match self.reconciler.api().delete_instance(id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        self.reconciler
            .wait_for_instance_gone(id, self.timeouts.delete)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratoform_compute::mock::{MockCompute, instance_fixture};

    fn resource(mock: &Arc<MockCompute>) -> InstanceResource {
        let timeouts = OperationTimeouts::default()
            .with_create(Duration::from_secs(5))
            .with_update(Duration::from_secs(5))
            .with_delete(Duration::from_secs(5));
        InstanceResource::new(Arc::clone(mock) as Arc<dyn ComputeApi>, timeouts)
            .with_poll_interval(Duration::from_millis(1))
    }

    fn config(status: InstanceStatus) -> InstanceConfig {
        InstanceConfig {
            name: "web-01".to_string(),
            flavor_id: "small".to_string(),
            image_id: Some("ubuntu-24.04".to_string()),
            key_name: None,
            status,
            volumes: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_attaches_volumes_and_converges_status() {
        let mock = Arc::new(MockCompute::new());
        mock.add_volume(stratoform_api::Volume {
            id: "vol-data".to_string(),
            name: None,
            size_gb: 100,
            volume_type: None,
            encryption_key_id: None,
            status: "available".to_string(),
            created_at: None,
        });

        let mut cfg = config(InstanceStatus::Stopped);
        cfg.volumes.push(DesiredVolume::existing("vol-data"));
        cfg.interfaces
            .push(DesiredInterface::on_subnet("s-1"));

        let instance = resource(&mock).create(&cfg).await.unwrap();

        assert_eq!(instance.status, "SHUTOFF");
        assert_eq!(instance.attached_volumes.len(), 1);
        assert_eq!(instance.attached_volumes[0].volume_id, "vol-data");
        assert!(mock.calls().contains(&format!("stop {}", instance.id)));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_config_before_any_call() {
        let mock = Arc::new(MockCompute::new());
        let mut cfg = config(InstanceStatus::Active);
        cfg.volumes.push(DesiredVolume::default());

        let err = resource(&mock).create(&cfg).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_resizes_in_place() {
        let mock = Arc::new(MockCompute::new());
        let mut instance = instance_fixture("i-1", "ACTIVE");
        instance
            .attached_volumes
            .push(stratoform_api::VolumeAttachment {
                volume_id: "v-1".to_string(),
                device: None,
                delete_on_termination: false,
                size_gb: 50,
                volume_type: None,
                encryption_key_id: None,
                status: "in-use".to_string(),
            });
        mock.add_instance(instance);

        let mut cfg = config(InstanceStatus::Active);
        cfg.volumes.push(DesiredVolume::existing("v-1").with_size(100));

        let updated = resource(&mock).update("i-1", &cfg).await.unwrap();

        assert_eq!(updated.attached_volumes[0].size_gb, 100);
        let calls = mock.calls();
        assert!(calls.contains(&"extend_volume v-1 100".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("detach_volume")));
    }

    #[tokio::test]
    async fn test_read_maps_404_to_none() {
        let mock = Arc::new(MockCompute::new());
        assert!(resource(&mock).read("i-404").await.unwrap().is_none());

        mock.add_instance(instance_fixture("i-1", "ACTIVE"));
        assert!(resource(&mock).read("i-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_waits_for_404_and_tolerates_absence() {
        let mock = Arc::new(MockCompute::new());
        mock.add_instance(instance_fixture("i-1", "ACTIVE"));
        let res = resource(&mock);

        res.delete("i-1").await.unwrap();
        assert!(res.read("i-1").await.unwrap().is_none());

        // Deleting again hits the 404 path and still succeeds.
        res.delete("i-1").await.unwrap();
    }
}

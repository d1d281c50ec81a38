//! Standalone volume lifecycle operations
//!
//! Attachment-scoped settings (device, delete-on-termination) belong to the
//! instance resource; this covers volumes as first-class storage.

use std::sync::Arc;
use std::time::Duration;

use stratoform_api::{ComputeApi, CreateVolumeRequest, Volume};
use stratoform_compute::Reconciler;

use crate::config::OperationTimeouts;
use crate::error::{ProviderError, Result};

/// Declared configuration for one volume
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    pub name: Option<String>,

    pub size_gb: i64,

    pub volume_type: Option<String>,

    pub encryption_key_id: Option<String>,

    /// Create from this snapshot instead of empty
    pub snapshot_id: Option<String>,
}

/// CRUD surface for volumes
pub struct VolumeResource {
    reconciler: Reconciler,
    timeouts: OperationTimeouts,
}

impl VolumeResource {
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

    /// Create the volume and wait until it is available for attachment
    pub async fn create(&self, config: &VolumeConfig) -> Result<Volume> {
        if config.size_gb <= 0 {
            return Err(ProviderError::Validation {
                messages: vec![format!(
                    "volume size_gb must be positive, got {}",
                    config.size_gb
                )],
            });
        }

        let request = CreateVolumeRequest {
            name: config.name.clone(),
            size_gb: config.size_gb,
            volume_type: config.volume_type.clone(),
            encryption_key_id: config.encryption_key_id.clone(),
            snapshot_id: config.snapshot_id.clone(),
        };
        let created = self.reconciler.api().create_volume(&request).await?;
        tracing::info!("created volume {}", created.id);

        let accepted = ["available".to_string(), "error".to_string()];
        let volume = self
            .reconciler
            .wait_for_volume_status(&created.id, &accepted, self.timeouts.create)
            .await?;
        if volume.status == "error" {
            return Err(ProviderError::ResourceErrored {
                resource: "volume",
                id: created.id,
                operation: "create",
            });
        }
        Ok(volume)
    }

    pub async fn read(&self, id: &str) -> Result<Option<Volume>> {
        match self.reconciler.api().get_volume(id).await {
            Ok(volume) => Ok(Some(volume)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Grow the volume to the configured size; shrinking is rejected
    pub async fn update(&self, id: &str, config: &VolumeConfig) -> Result<Volume> {
        let current = self.reconciler.api().get_volume(id).await?;

        if config.size_gb < current.size_gb {
            return Err(ProviderError::Validation {
                messages: vec![format!(
                    "volume {}: size can only grow, {} GB -> {} GB is a shrink",
                    id, current.size_gb, config.size_gb
                )],
            });
        }
        if config.size_gb > current.size_gb {
            self.reconciler
                .api()
                .extend_volume(id, config.size_gb)
                .await?;
            self.reconciler
                .wait_for_volume_size(id, config.size_gb, self.timeouts.update)
                .await?;
        }

        Ok(self.reconciler.api().get_volume(id).await?)
    }

    /// Delete the volume and wait until an existence check reports 404
    pub async fn delete(&self, id: &str) -> Result<()> {
        match self.reconciler.api().delete_volume(id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        self.reconciler
            .wait_for_volume_gone(id, self.timeouts.delete)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratoform_compute::mock::MockCompute;

    fn resource(mock: &Arc<MockCompute>) -> VolumeResource {
        let timeouts = OperationTimeouts::default()
            .with_create(Duration::from_secs(5))
            .with_update(Duration::from_secs(5))
            .with_delete(Duration::from_secs(5));
        VolumeResource::new(Arc::clone(mock) as Arc<dyn ComputeApi>, timeouts)
            .with_poll_interval(Duration::from_millis(1))
    }

    fn config(size_gb: i64) -> VolumeConfig {
        VolumeConfig {
            name: Some("data".to_string()),
            size_gb,
            volume_type: None,
            encryption_key_id: None,
            snapshot_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_waits_for_available() {
        let mock = Arc::new(MockCompute::new());
        let volume = resource(&mock).create(&config(50)).await.unwrap();
        assert_eq!(volume.status, "available");
        assert_eq!(volume.size_gb, 50);
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_size() {
        let mock = Arc::new(MockCompute::new());
        let err = resource(&mock).create(&config(0)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_grows_and_rejects_shrink() {
        let mock = Arc::new(MockCompute::new());
        let res = resource(&mock);
        let volume = res.create(&config(50)).await.unwrap();

        let grown = res.update(&volume.id, &config(80)).await.unwrap();
        assert_eq!(grown.size_gb, 80);

        let err = res.update(&volume.id, &config(40)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let mock = Arc::new(MockCompute::new());
        let res = resource(&mock);
        let volume = res.create(&config(50)).await.unwrap();

        res.delete(&volume.id).await.unwrap();
        assert!(res.read(&volume.id).await.unwrap().is_none());
        res.delete(&volume.id).await.unwrap();
    }
}

//! Snapshot lifecycle operations

use std::sync::Arc;
use std::time::Duration;

use stratoform_api::{ComputeApi, CreateSnapshotRequest, Snapshot};
use stratoform_compute::Reconciler;

use crate::config::OperationTimeouts;
use crate::error::{ProviderError, Result};

/// Declared configuration for one snapshot
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub name: Option<String>,

    pub volume_id: String,
}

/// CRUD surface for snapshots (no update; snapshots are immutable)
pub struct SnapshotResource {
    reconciler: Reconciler,
    timeouts: OperationTimeouts,
}

impl SnapshotResource {
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

    /// Create the snapshot and wait until it is usable
    pub async fn create(&self, config: &SnapshotConfig) -> Result<Snapshot> {
        if config.volume_id.is_empty() {
            return Err(ProviderError::Validation {
                messages: vec!["snapshot volume_id must not be empty".to_string()],
            });
        }

        let request = CreateSnapshotRequest {
            name: config.name.clone(),
            volume_id: config.volume_id.clone(),
        };
        let created = self.reconciler.api().create_snapshot(&request).await?;
        tracing::info!("created snapshot {} of volume {}", created.id, config.volume_id);

        let accepted = ["available".to_string(), "error".to_string()];
        let snapshot = self
            .reconciler
            .wait_for_snapshot_status(&created.id, &accepted, self.timeouts.create)
            .await?;
        if snapshot.status == "error" {
            return Err(ProviderError::ResourceErrored {
                resource: "snapshot",
                id: created.id,
                operation: "create",
            });
        }
        Ok(snapshot)
    }

    pub async fn read(&self, id: &str) -> Result<Option<Snapshot>> {
        match self.reconciler.api().get_snapshot(id).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete the snapshot and wait until an existence check reports 404
    pub async fn delete(&self, id: &str) -> Result<()> {
        match self.reconciler.api().delete_snapshot(id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        self.reconciler
            .wait_for_snapshot_gone(id, self.timeouts.delete)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratoform_compute::mock::MockCompute;

    fn resource(mock: &Arc<MockCompute>) -> SnapshotResource {
        let timeouts = OperationTimeouts::default()
            .with_create(Duration::from_secs(5))
            .with_delete(Duration::from_secs(5));
        SnapshotResource::new(Arc::clone(mock) as Arc<dyn ComputeApi>, timeouts)
            .with_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_create_read_delete_round_trip() {
        let mock = Arc::new(MockCompute::new());
        let res = resource(&mock);

        let snapshot = res
            .create(&SnapshotConfig {
                name: Some("backup".to_string()),
                volume_id: "v-1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(snapshot.status, "available");
        assert_eq!(snapshot.volume_id, "v-1");

        assert!(res.read(&snapshot.id).await.unwrap().is_some());
        res.delete(&snapshot.id).await.unwrap();
        assert!(res.read(&snapshot.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_requires_volume_id() {
        let mock = Arc::new(MockCompute::new());
        let err = resource(&mock)
            .create(&SnapshotConfig {
                name: None,
                volume_id: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
    }
}

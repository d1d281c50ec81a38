//! Attach/detach orchestration and the status transition engine
//!
//! The [`Reconciler`] owns an injected API handle and drives every mutating
//! step the same way: issue the call, then poll the read-back view until the
//! cloud confirms the post-condition. The mutating call's own response is
//! never trusted as confirmation; attach and detach are only done when the
//! instance's refreshed sub-resource list says so.

use std::sync::Arc;
use std::time::Duration;

use stratoform_api::{
    AttachVolumeOptions, ComputeApi, CreateVolumeRequest, Instance, Snapshot, Volume,
};

use crate::diff::{InterfaceOp, VolumeOp};
use crate::error::{ComputeError, Result};
use crate::model::DesiredVolume;
use crate::poll::{self, OperationDeadline};
use crate::status::{InstanceStatus, SETTLED_STATUSES, TransitionAction, transition_actions};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Volume attachment status the cloud reports once an attach has settled
const VOLUME_ATTACHED: &str = "in-use";
/// Synthetic status label for an element missing from the read-back view
const ABSENT: &str = "absent";
const ATTACHED: &str = "attached";

/// Drives instance reconciliation against an injected [`ComputeApi`]
pub struct Reconciler {
    api: Arc<dyn ComputeApi>,
    poll_interval: Duration,
}

impl Reconciler {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn api(&self) -> &Arc<dyn ComputeApi> {
        &self.api
    }

    /// Poll the instance until its parsed status lands in `accepted`
    pub async fn wait_for_instance_status(
        &self,
        id: &str,
        accepted: &[InstanceStatus],
        timeout: Duration,
    ) -> Result<Instance> {
        let api = Arc::clone(&self.api);
        let id_owned = id.to_string();
        poll::wait_for_status(
            &format!("instance {}", id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_instance(&id).await }
            },
            |instance: &Instance| InstanceStatus::parse(&instance.status),
            accepted,
            self.poll_interval,
            timeout,
        )
        .await
    }

    /// Poll the volume until its status lands in `accepted`
    pub async fn wait_for_volume_status(
        &self,
        id: &str,
        accepted: &[String],
        timeout: Duration,
    ) -> Result<Volume> {
        let api = Arc::clone(&self.api);
        let id_owned = id.to_string();
        poll::wait_for_status(
            &format!("volume {}", id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_volume(&id).await }
            },
            |volume: &Volume| volume.status.clone(),
            accepted,
            self.poll_interval,
            timeout,
        )
        .await
    }

    /// Poll the snapshot until its status lands in `accepted`
    pub async fn wait_for_snapshot_status(
        &self,
        id: &str,
        accepted: &[String],
        timeout: Duration,
    ) -> Result<Snapshot> {
        let api = Arc::clone(&self.api);
        let id_owned = id.to_string();
        poll::wait_for_status(
            &format!("snapshot {}", id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_snapshot(&id).await }
            },
            |snapshot: &Snapshot| snapshot.status.clone(),
            accepted,
            self.poll_interval,
            timeout,
        )
        .await
    }

    /// Poll until the instance no longer exists
    pub async fn wait_for_instance_gone(&self, id: &str, timeout: Duration) -> Result<()> {
        let api = Arc::clone(&self.api);
        let id_owned = id.to_string();
        poll::wait_for_gone(
            &format!("deletion of instance {}", id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_instance(&id).await }
            },
            self.poll_interval,
            timeout,
        )
        .await
    }

    /// Poll until the volume no longer exists
    pub async fn wait_for_volume_gone(&self, id: &str, timeout: Duration) -> Result<()> {
        let api = Arc::clone(&self.api);
        let id_owned = id.to_string();
        poll::wait_for_gone(
            &format!("deletion of volume {}", id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_volume(&id).await }
            },
            self.poll_interval,
            timeout,
        )
        .await
    }

    /// Poll until the snapshot no longer exists
    pub async fn wait_for_snapshot_gone(&self, id: &str, timeout: Duration) -> Result<()> {
        let api = Arc::clone(&self.api);
        let id_owned = id.to_string();
        poll::wait_for_gone(
            &format!("deletion of snapshot {}", id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_snapshot(&id).await }
            },
            self.poll_interval,
            timeout,
        )
        .await
    }

    /// Walk the status transition table from the instance's current status
    /// to `desired`, executing each hop and polling it to convergence.
    ///
    /// The settle poll and every hop draw from one shared `timeout` budget.
    /// A transient current status is first polled to a settled state; an
    /// ERROR status, whether already settled or observed after a hop, is a
    /// hard failure. Other pairs without a table entry are a no-op; equal
    /// states perform no API calls at all.
    pub async fn converge_status(
        &self,
        current: &Instance,
        desired: &InstanceStatus,
        timeout: Duration,
    ) -> Result<Instance> {
        let deadline = OperationDeadline::after(timeout);
        let mut latest = current.clone();
        let mut status = InstanceStatus::parse(&latest.status);

        if !status.is_stable() && status != InstanceStatus::Error {
            latest = self
                .wait_for_instance_status(&latest.id, SETTLED_STATUSES, deadline.remaining())
                .await?;
            status = InstanceStatus::parse(&latest.status);
        }

        if status == InstanceStatus::Error && desired != &InstanceStatus::Error {
            return Err(ComputeError::ResourceUnavailable {
                id: latest.id.clone(),
                action: "reconcile".to_string(),
            });
        }

        let actions = transition_actions(&status, desired);
        if actions.is_empty() {
            if &status != desired {
                tracing::debug!(
                    "instance {}: no transition from {} to {}, leaving as is",
                    latest.id,
                    status,
                    desired
                );
            }
            return Ok(latest);
        }

        for action in actions {
            tracing::info!("instance {}: {}", latest.id, action);
            match action {
                TransitionAction::Start => self.api.start_instance(&latest.id).await?,
                TransitionAction::Stop => self.api.stop_instance(&latest.id).await?,
                TransitionAction::Shelve => self.api.shelve_instance(&latest.id).await?,
                TransitionAction::Unshelve => self.api.unshelve_instance(&latest.id).await?,
            }

            let accepted = [action.expected_status(), InstanceStatus::Error];
            latest = self
                .wait_for_instance_status(&latest.id, &accepted, deadline.remaining())
                .await?;
            if InstanceStatus::parse(&latest.status) == InstanceStatus::Error {
                return Err(ComputeError::ResourceUnavailable {
                    id: latest.id.clone(),
                    action: action.name().to_string(),
                });
            }
        }

        Ok(latest)
    }

    /// Attach an existing volume and confirm it via instance read-back
    pub async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        opts: &AttachVolumeOptions,
        timeout: Duration,
    ) -> Result<()> {
        tracing::info!("instance {}: attaching volume {}", instance_id, volume_id);
        self.api.attach_volume(instance_id, volume_id, opts).await?;
        self.wait_for_attachment_status(instance_id, volume_id, VOLUME_ATTACHED, timeout)
            .await
    }

    /// Detach a volume and confirm its absence via instance read-back
    ///
    /// A 404 from the mutating call means the attachment is already gone and
    /// is treated as success.
    pub async fn detach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        timeout: Duration,
    ) -> Result<()> {
        tracing::info!("instance {}: detaching volume {}", instance_id, volume_id);
        match self.api.detach_volume(instance_id, volume_id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        self.wait_for_attachment_status(instance_id, volume_id, ABSENT, timeout)
            .await
    }

    /// Attach a network interface and confirm it via instance read-back
    pub async fn attach_interface(
        &self,
        instance_id: &str,
        port_id: &str,
        timeout: Duration,
    ) -> Result<()> {
        tracing::info!("instance {}: attaching interface {}", instance_id, port_id);
        self.api.attach_interface(instance_id, port_id).await?;
        self.wait_for_interface_presence(instance_id, port_id, ATTACHED, timeout)
            .await
    }

    /// Detach a network interface and confirm its absence via read-back
    pub async fn detach_interface(
        &self,
        instance_id: &str,
        port_id: &str,
        timeout: Duration,
    ) -> Result<()> {
        tracing::info!("instance {}: detaching interface {}", instance_id, port_id);
        match self.api.detach_interface(instance_id, port_id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        self.wait_for_interface_presence(instance_id, port_id, ABSENT, timeout)
            .await
    }

    /// Execute a volume operation list strictly in order, aborting on the
    /// first failure. All operations draw from one shared `timeout` budget.
    /// Partial application is possible and left for the next reconciliation
    /// pass.
    pub async fn apply_volume_ops(
        &self,
        instance_id: &str,
        ops: &[VolumeOp],
        timeout: Duration,
    ) -> Result<()> {
        let deadline = OperationDeadline::after(timeout);
        for op in ops {
            match op {
                VolumeOp::Detach { volume_id } => {
                    self.detach_volume(instance_id, volume_id, deadline.remaining())
                        .await?;
                }
                VolumeOp::SetDeleteOnTermination { volume_id, value } => {
                    tracing::info!(
                        "instance {}: setting delete_on_termination={} on volume {}",
                        instance_id,
                        value,
                        volume_id
                    );
                    self.api
                        .update_volume_attachment(instance_id, volume_id, *value)
                        .await?;
                }
                VolumeOp::Extend {
                    volume_id,
                    new_size_gb,
                } => {
                    tracing::info!(
                        "instance {}: extending volume {} to {} GB",
                        instance_id,
                        volume_id,
                        new_size_gb
                    );
                    self.api.extend_volume(volume_id, *new_size_gb).await?;
                    self.wait_for_volume_size(volume_id, *new_size_gb, deadline.remaining())
                        .await?;
                }
                VolumeOp::Attach(spec) => {
                    let volume_id = match &spec.volume_id {
                        Some(id) => id.clone(),
                        None => self.create_volume_for(spec, deadline.remaining()).await?,
                    };
                    let opts = AttachVolumeOptions {
                        device: spec.device.clone(),
                        delete_on_termination: spec.delete_on_termination,
                    };
                    self.attach_volume(instance_id, &volume_id, &opts, deadline.remaining())
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Execute an interface operation list strictly in order, all operations
    /// drawing from one shared `timeout` budget
    pub async fn apply_interface_ops(
        &self,
        instance_id: &str,
        ops: &[InterfaceOp],
        timeout: Duration,
    ) -> Result<()> {
        let deadline = OperationDeadline::after(timeout);
        for op in ops {
            match op {
                InterfaceOp::Detach { port_id } => {
                    self.detach_interface(instance_id, port_id, deadline.remaining())
                        .await?;
                }
                InterfaceOp::Attach { port_id } => {
                    self.attach_interface(instance_id, port_id, deadline.remaining())
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Create the new volume a desired entry describes and wait for it to
    /// become available for attachment.
    async fn create_volume_for(&self, spec: &DesiredVolume, timeout: Duration) -> Result<String> {
        let size_gb = spec
            .size_gb
            .ok_or_else(|| ComputeError::UnresolvedVolume {
                device: spec.device.clone(),
            })?;
        let req = CreateVolumeRequest {
            name: None,
            size_gb,
            volume_type: spec.volume_type.clone(),
            encryption_key_id: spec.encryption_key_id.clone(),
            snapshot_id: spec.snapshot_id.clone(),
        };
        let volume = self.api.create_volume(&req).await?;
        self.wait_for_volume_status(&volume.id, &["available".to_string()], timeout)
            .await?;
        Ok(volume.id)
    }

    /// Poll the instance until the named volume's attachment status (or the
    /// synthetic "absent" label) matches `expected`.
    async fn wait_for_attachment_status(
        &self,
        instance_id: &str,
        volume_id: &str,
        expected: &str,
        timeout: Duration,
    ) -> Result<()> {
        let api = Arc::clone(&self.api);
        let id_owned = instance_id.to_string();
        let volume = volume_id.to_string();
        poll::wait_for_status(
            &format!("volume {} on instance {}", volume_id, instance_id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_instance(&id).await }
            },
            move |instance: &Instance| {
                instance
                    .attached_volume(&volume)
                    .map(|v| v.status.clone())
                    .unwrap_or_else(|| ABSENT.to_string())
            },
            &[expected.to_string()],
            self.poll_interval,
            timeout,
        )
        .await?;
        Ok(())
    }

    /// Poll the instance until the named port is present ("attached") or
    /// absent, matching `expected`.
    async fn wait_for_interface_presence(
        &self,
        instance_id: &str,
        port_id: &str,
        expected: &str,
        timeout: Duration,
    ) -> Result<()> {
        let api = Arc::clone(&self.api);
        let id_owned = instance_id.to_string();
        let port = port_id.to_string();
        poll::wait_for_status(
            &format!("interface {} on instance {}", port_id, instance_id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_instance(&id).await }
            },
            move |instance: &Instance| {
                if instance.interface(&port).is_some() {
                    ATTACHED.to_string()
                } else {
                    ABSENT.to_string()
                }
            },
            &[expected.to_string()],
            self.poll_interval,
            timeout,
        )
        .await?;
        Ok(())
    }

    /// Poll the volume until its reported size matches the resize target
    pub async fn wait_for_volume_size(
        &self,
        volume_id: &str,
        size_gb: i64,
        timeout: Duration,
    ) -> Result<()> {
        let api = Arc::clone(&self.api);
        let id_owned = volume_id.to_string();
        poll::wait_for_status(
            &format!("resize of volume {}", volume_id),
            move || {
                let api = Arc::clone(&api);
                let id = id_owned.clone();
                async move { api.get_volume(&id).await }
            },
            |volume: &Volume| volume.size_gb,
            &[size_gb],
            self.poll_interval,
            timeout,
        )
        .await?;
        Ok(())
    }
}

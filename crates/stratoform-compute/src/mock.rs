//! Scriptable in-memory `ComputeApi` for tests
//!
//! Holds instances, volumes, snapshots and keypairs behind a mutex, records
//! every call, and lets tests script status sequences (successive
//! `get_instance` results) and action outcomes (the status an instance lands
//! on after start/stop/shelve/unshelve).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use stratoform_api::{
    ApiError, AttachVolumeOptions, ComputeApi, CreateInstanceRequest, CreateSnapshotRequest,
    CreateVolumeRequest, ImportKeypairRequest, Instance, InterfaceAttachment, Keypair, Result,
    Snapshot, Volume, VolumeAttachment,
};

#[derive(Default)]
struct MockState {
    instances: HashMap<String, Instance>,
    volumes: HashMap<String, Volume>,
    snapshots: HashMap<String, Snapshot>,
    keypairs: HashMap<String, Keypair>,
    ports: HashMap<String, InterfaceAttachment>,
    /// Statuses returned by successive get_instance calls, per instance
    status_scripts: HashMap<String, VecDeque<String>>,
    /// Status an instance lands on after an action, overriding the default
    action_overrides: HashMap<&'static str, String>,
    calls: Vec<String>,
    next_id: u32,
}

/// In-memory compute API double
#[derive(Default)]
pub struct MockCompute {
    state: Mutex<MockState>,
}

/// Build a bare instance fixture
pub fn instance_fixture(id: &str, status: &str) -> Instance {
    Instance {
        id: id.to_string(),
        name: format!("{}-name", id),
        status: status.to_string(),
        attached_volumes: Vec::new(),
        interfaces: Vec::new(),
        key_name: None,
        created_at: None,
    }
}

impl MockCompute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&self, instance: Instance) {
        let mut state = self.state.lock().unwrap();
        state.instances.insert(instance.id.clone(), instance);
    }

    pub fn add_volume(&self, volume: Volume) {
        let mut state = self.state.lock().unwrap();
        state.volumes.insert(volume.id.clone(), volume);
    }

    pub fn add_port(&self, port: InterfaceAttachment) {
        let mut state = self.state.lock().unwrap();
        state.ports.insert(port.port_id.clone(), port);
    }

    /// Queue statuses for successive `get_instance` calls on `id`
    pub fn script_status(&self, id: &str, statuses: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state
            .status_scripts
            .entry(id.to_string())
            .or_default()
            .extend(statuses.iter().map(|s| s.to_string()));
    }

    /// Make `action` land the instance on `status` instead of its default
    pub fn override_action(&self, action: &'static str, status: &str) {
        let mut state = self.state.lock().unwrap();
        state.action_overrides.insert(action, status.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn instance(&self, id: &str) -> Instance {
        self.state.lock().unwrap().instances[id].clone()
    }

    fn log(state: &mut MockState, call: String) {
        state.calls.push(call);
    }

    fn apply_action(&self, id: &str, action: &'static str, default_status: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("{} {}", action, id));
        let status = state
            .action_overrides
            .get(action)
            .cloned()
            .unwrap_or_else(|| default_status.to_string());
        match state.instances.get_mut(id) {
            Some(instance) => {
                instance.status = status;
                Ok(())
            }
            None => Err(not_found("instance", id)),
        }
    }
}

fn not_found(resource: &'static str, id: &str) -> ApiError {
    ApiError::NotFound {
        resource,
        id: id.to_string(),
    }
}

#[async_trait]
impl ComputeApi for MockCompute {
    async fn get_instance(&self, id: &str) -> Result<Instance> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("get_instance {}", id));
        if let Some(script) = state.status_scripts.get_mut(id) {
            if let Some(next) = script.pop_front() {
                if let Some(instance) = state.instances.get_mut(id) {
                    instance.status = next;
                }
            }
        }
        state
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("instance", id))
    }

    async fn create_instance(&self, req: &CreateInstanceRequest) -> Result<Instance> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("i-{}", state.next_id);
        Self::log(&mut state, format!("create_instance {}", id));
        let mut instance = instance_fixture(&id, "ACTIVE");
        instance.name = req.name.clone();
        instance.key_name = req.key_name.clone();
        for (n, subnet) in req.subnets.iter().enumerate() {
            instance.interfaces.push(InterfaceAttachment {
                port_id: format!("{}-p{}", id, n),
                subnet_id: subnet.clone(),
                fixed_ip: None,
                status: Some("ACTIVE".to_string()),
            });
        }
        state.instances.insert(id.clone(), instance.clone());
        Ok(instance)
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("delete_instance {}", id));
        state
            .instances
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("instance", id))
    }

    async fn start_instance(&self, id: &str) -> Result<()> {
        self.apply_action(id, "start", "ACTIVE")
    }

    async fn stop_instance(&self, id: &str) -> Result<()> {
        self.apply_action(id, "stop", "SHUTOFF")
    }

    async fn shelve_instance(&self, id: &str) -> Result<()> {
        self.apply_action(id, "shelve", "SHELVED_OFFLOADED")
    }

    async fn unshelve_instance(&self, id: &str) -> Result<()> {
        self.apply_action(id, "unshelve", "ACTIVE")
    }

    async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        opts: &AttachVolumeOptions,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(
            &mut state,
            format!("attach_volume {} {}", instance_id, volume_id),
        );
        let (size_gb, volume_type, encryption_key_id) = match state.volumes.get_mut(volume_id) {
            Some(volume) => {
                volume.status = "in-use".to_string();
                (
                    volume.size_gb,
                    volume.volume_type.clone(),
                    volume.encryption_key_id.clone(),
                )
            }
            None => (0, None, None),
        };
        let attachment = VolumeAttachment {
            volume_id: volume_id.to_string(),
            device: opts.device.clone(),
            delete_on_termination: opts.delete_on_termination,
            size_gb,
            volume_type,
            encryption_key_id,
            status: "in-use".to_string(),
        };
        state
            .instances
            .get_mut(instance_id)
            .map(|instance| instance.attached_volumes.push(attachment))
            .ok_or_else(|| not_found("instance", instance_id))
    }

    async fn detach_volume(&self, instance_id: &str, volume_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(
            &mut state,
            format!("detach_volume {} {}", instance_id, volume_id),
        );
        if let Some(volume) = state.volumes.get_mut(volume_id) {
            volume.status = "available".to_string();
        }
        let instance = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| not_found("instance", instance_id))?;
        let before = instance.attached_volumes.len();
        instance.attached_volumes.retain(|v| v.volume_id != volume_id);
        if instance.attached_volumes.len() == before {
            return Err(not_found("volume", volume_id));
        }
        Ok(())
    }

    async fn update_volume_attachment(
        &self,
        instance_id: &str,
        volume_id: &str,
        delete_on_termination: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(
            &mut state,
            format!("update_volume_attachment {} {}", instance_id, volume_id),
        );
        let instance = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| not_found("instance", instance_id))?;
        let attachment = instance
            .attached_volumes
            .iter_mut()
            .find(|v| v.volume_id == volume_id)
            .ok_or_else(|| not_found("volume", volume_id))?;
        attachment.delete_on_termination = delete_on_termination;
        Ok(())
    }

    async fn attach_interface(&self, instance_id: &str, port_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(
            &mut state,
            format!("attach_interface {} {}", instance_id, port_id),
        );
        let attachment = state.ports.get(port_id).cloned().unwrap_or_else(|| {
            InterfaceAttachment {
                port_id: port_id.to_string(),
                subnet_id: "unknown".to_string(),
                fixed_ip: None,
                status: Some("ACTIVE".to_string()),
            }
        });
        state
            .instances
            .get_mut(instance_id)
            .map(|instance| instance.interfaces.push(attachment))
            .ok_or_else(|| not_found("instance", instance_id))
    }

    async fn detach_interface(&self, instance_id: &str, port_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(
            &mut state,
            format!("detach_interface {} {}", instance_id, port_id),
        );
        let instance = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| not_found("instance", instance_id))?;
        let before = instance.interfaces.len();
        instance.interfaces.retain(|i| i.port_id != port_id);
        if instance.interfaces.len() == before {
            return Err(not_found("interface", port_id));
        }
        Ok(())
    }

    async fn list_interfaces(&self, instance_id: &str) -> Result<Vec<InterfaceAttachment>> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("list_interfaces {}", instance_id));
        state
            .instances
            .get(instance_id)
            .map(|instance| instance.interfaces.clone())
            .ok_or_else(|| not_found("instance", instance_id))
    }

    async fn get_interface(&self, port_id: &str) -> Result<InterfaceAttachment> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("get_interface {}", port_id));
        state
            .ports
            .get(port_id)
            .cloned()
            .ok_or_else(|| not_found("interface", port_id))
    }

    async fn create_volume(&self, req: &CreateVolumeRequest) -> Result<Volume> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("v-{}", state.next_id);
        Self::log(&mut state, format!("create_volume {}", id));
        let volume = Volume {
            id: id.clone(),
            name: req.name.clone(),
            size_gb: req.size_gb,
            volume_type: req.volume_type.clone(),
            encryption_key_id: req.encryption_key_id.clone(),
            status: "available".to_string(),
            created_at: None,
        };
        state.volumes.insert(id, volume.clone());
        Ok(volume)
    }

    async fn get_volume(&self, id: &str) -> Result<Volume> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("get_volume {}", id));
        state
            .volumes
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("volume", id))
    }

    async fn extend_volume(&self, id: &str, new_size_gb: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("extend_volume {} {}", id, new_size_gb));
        if let Some(volume) = state.volumes.get_mut(id) {
            volume.size_gb = new_size_gb;
        } else {
            state.volumes.insert(
                id.to_string(),
                Volume {
                    id: id.to_string(),
                    name: None,
                    size_gb: new_size_gb,
                    volume_type: None,
                    encryption_key_id: None,
                    status: "in-use".to_string(),
                    created_at: None,
                },
            );
        }
        for instance in state.instances.values_mut() {
            if let Some(attachment) = instance
                .attached_volumes
                .iter_mut()
                .find(|v| v.volume_id == id)
            {
                attachment.size_gb = new_size_gb;
            }
        }
        Ok(())
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("delete_volume {}", id));
        state
            .volumes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("volume", id))
    }

    async fn create_snapshot(&self, req: &CreateSnapshotRequest) -> Result<Snapshot> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("snap-{}", state.next_id);
        Self::log(&mut state, format!("create_snapshot {}", id));
        let size_gb = state
            .volumes
            .get(&req.volume_id)
            .map(|v| v.size_gb)
            .unwrap_or(0);
        let snapshot = Snapshot {
            id: id.clone(),
            name: req.name.clone(),
            volume_id: req.volume_id.clone(),
            size_gb,
            status: "available".to_string(),
            created_at: None,
        };
        state.snapshots.insert(id, snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, id: &str) -> Result<Snapshot> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("get_snapshot {}", id));
        state
            .snapshots
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("snapshot", id))
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("delete_snapshot {}", id));
        state
            .snapshots
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("snapshot", id))
    }

    async fn import_keypair(&self, req: &ImportKeypairRequest) -> Result<Keypair> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("import_keypair {}", req.name));
        let keypair = Keypair {
            name: req.name.clone(),
            public_key: req.public_key.clone(),
            fingerprint: None,
        };
        state.keypairs.insert(req.name.clone(), keypair.clone());
        Ok(keypair)
    }

    async fn get_keypair(&self, name: &str) -> Result<Keypair> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("get_keypair {}", name));
        state
            .keypairs
            .get(name)
            .cloned()
            .ok_or_else(|| not_found("keypair", name))
    }

    async fn delete_keypair(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, format!("delete_keypair {}", name));
        state
            .keypairs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("keypair", name))
    }
}

//! Desired-vs-live diffing for instance sub-resources
//!
//! Produces ordered operation lists. Ordering is a correctness guarantee,
//! not an accident: all detaches and in-place edits from the live-side scan
//! come before any attach from the desired-side scan, so a slot is always
//! freed before anything new lands in it.

use std::collections::{HashMap, HashSet};

use stratoform_api::{InterfaceAttachment, VolumeAttachment};

use crate::error::{ComputeError, Result};
use crate::model::{DesiredInterface, DesiredVolume};

/// One operation against the instance's volume set
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeOp {
    Detach { volume_id: String },
    SetDeleteOnTermination { volume_id: String, value: bool },
    Extend { volume_id: String, new_size_gb: i64 },
    Attach(DesiredVolume),
}

/// One operation against the instance's interface set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceOp {
    Detach { port_id: String },
    Attach { port_id: String },
}

/// Compute the volume operations taking `live` to `desired`.
///
/// Desired entries with a volume id address existing storage; entries with
/// only a size request new storage. An entry with neither is unresolved
/// configuration and aborts the diff. Delete-on-termination changes edit the
/// attachment in place; size growth becomes a resize; volume type or
/// encryption key changes cannot be applied in place and become a detach
/// plus a fresh attach.
pub fn diff_volumes(
    desired: &[DesiredVolume],
    live: &[VolumeAttachment],
) -> Result<Vec<VolumeOp>> {
    let mut desired_by_id: HashMap<&str, &DesiredVolume> = HashMap::new();
    for spec in desired {
        match (spec.volume_id.as_deref(), spec.size_gb) {
            (Some(id), _) => {
                desired_by_id.insert(id, spec);
            }
            (None, Some(_)) => {} // new volume, handled in the attach scan
            (None, None) => {
                return Err(ComputeError::UnresolvedVolume {
                    device: spec.device.clone(),
                });
            }
        }
    }

    let live_ids: HashSet<&str> = live.iter().map(|v| v.volume_id.as_str()).collect();
    let mut replaced: HashSet<&str> = HashSet::new();
    let mut ops = Vec::new();

    // Live-side scan: detaches, in-place edits, resizes.
    for attachment in live {
        let Some(spec) = desired_by_id.get(attachment.volume_id.as_str()) else {
            ops.push(VolumeOp::Detach {
                volume_id: attachment.volume_id.clone(),
            });
            continue;
        };

        let type_changed =
            spec.volume_type.is_some() && spec.volume_type != attachment.volume_type;
        let key_changed = spec.encryption_key_id.is_some()
            && spec.encryption_key_id != attachment.encryption_key_id;
        if type_changed || key_changed {
            // Immutable fields changed: free the slot, re-attach later.
            ops.push(VolumeOp::Detach {
                volume_id: attachment.volume_id.clone(),
            });
            replaced.insert(attachment.volume_id.as_str());
            continue;
        }

        if spec.delete_on_termination != attachment.delete_on_termination {
            ops.push(VolumeOp::SetDeleteOnTermination {
                volume_id: attachment.volume_id.clone(),
                value: spec.delete_on_termination,
            });
        }
        if let Some(size) = spec.size_gb {
            // Shrinking is rejected by configuration validation upstream.
            if size > attachment.size_gb {
                ops.push(VolumeOp::Extend {
                    volume_id: attachment.volume_id.clone(),
                    new_size_gb: size,
                });
            }
        }
    }

    // Desired-side scan: attaches, in declared order.
    for spec in desired {
        let needs_attach = match spec.volume_id.as_deref() {
            Some(id) => !live_ids.contains(id) || replaced.contains(id),
            None => true,
        };
        if needs_attach {
            ops.push(VolumeOp::Attach(spec.clone()));
        }
    }

    Ok(ops)
}

/// Compute the interface operations taking `live` to `desired`.
///
/// Interfaces have no in-place edits; every difference is a detach or an
/// attach keyed by port id. Desired entries must already carry a resolved
/// port id (see [`crate::resolve`]).
pub fn diff_interfaces(
    desired: &[DesiredInterface],
    live: &[InterfaceAttachment],
) -> Result<Vec<InterfaceOp>> {
    let mut desired_ids: HashSet<&str> = HashSet::new();
    for spec in desired {
        let id = spec
            .port_id
            .as_deref()
            .ok_or_else(|| ComputeError::UnresolvedInterface {
                subnet: spec.subnet_id.clone(),
            })?;
        desired_ids.insert(id);
    }
    let live_ids: HashSet<&str> = live.iter().map(|a| a.port_id.as_str()).collect();

    let mut ops = Vec::new();
    for attachment in live {
        if !desired_ids.contains(attachment.port_id.as_str()) {
            ops.push(InterfaceOp::Detach {
                port_id: attachment.port_id.clone(),
            });
        }
    }
    for spec in desired {
        if let Some(id) = spec.port_id.as_deref() {
            if !live_ids.contains(id) {
                ops.push(InterfaceOp::Attach {
                    port_id: id.to_string(),
                });
            }
        }
    }

    Ok(ops)
}

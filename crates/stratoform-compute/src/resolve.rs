//! Port id resolution for desired interfaces
//!
//! Users may declare an interface by subnet alone; before diffing, each such
//! entry must be pinned to a concrete port. Resolution walks the live
//! attachment list in its reported order (never map order), so re-running
//! against the same inputs always produces the same assignment.

use std::collections::HashSet;

use stratoform_api::InterfaceAttachment;

use crate::error::{ComputeError, Result};
use crate::model::DesiredInterface;

/// Assign a port id to every desired interface that lacks one, claiming each
/// live port at most once.
///
/// Fails with [`ComputeError::NoInterfaceForSubnet`] when the subnet has no
/// attachment at all, and [`ComputeError::SubnetInterfacesExhausted`] when
/// every attachment on the subnet is already claimed by another entry.
pub fn resolve_interface_ids(
    desired: &mut [DesiredInterface],
    live: &[InterfaceAttachment],
) -> Result<()> {
    let mut claimed: HashSet<String> = desired
        .iter()
        .filter_map(|spec| spec.port_id.clone())
        .collect();

    for spec in desired.iter_mut() {
        if spec.port_id.is_some() {
            continue;
        }

        let mut saw_subnet = false;
        let mut assigned = None;
        for attachment in live {
            if attachment.subnet_id != spec.subnet_id {
                continue;
            }
            saw_subnet = true;
            if !claimed.contains(&attachment.port_id) {
                assigned = Some(attachment.port_id.clone());
                break;
            }
        }

        match assigned {
            Some(port_id) => {
                tracing::debug!(
                    "resolved interface on subnet {} to port {}",
                    spec.subnet_id,
                    port_id
                );
                claimed.insert(port_id.clone());
                spec.port_id = Some(port_id);
            }
            None if saw_subnet => {
                return Err(ComputeError::SubnetInterfacesExhausted {
                    subnet: spec.subnet_id.clone(),
                });
            }
            None => {
                return Err(ComputeError::NoInterfaceForSubnet {
                    subnet: spec.subnet_id.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(port_id: &str, subnet_id: &str) -> InterfaceAttachment {
        InterfaceAttachment {
            port_id: port_id.to_string(),
            subnet_id: subnet_id.to_string(),
            fixed_ip: None,
            status: None,
        }
    }

    #[test]
    fn test_assigns_distinct_ports_per_entry() {
        let live = vec![port("p1", "s1"), port("p2", "s1"), port("p3", "s2")];
        let mut desired = vec![
            DesiredInterface::on_subnet("s1"),
            DesiredInterface::on_subnet("s1"),
            DesiredInterface::on_subnet("s2"),
        ];

        resolve_interface_ids(&mut desired, &live).unwrap();
        assert_eq!(desired[0].port_id.as_deref(), Some("p1"));
        assert_eq!(desired[1].port_id.as_deref(), Some("p2"));
        assert_eq!(desired[2].port_id.as_deref(), Some("p3"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let live = vec![port("p1", "s1"), port("p2", "s1")];
        let mut first = vec![
            DesiredInterface::on_subnet("s1"),
            DesiredInterface::on_subnet("s1"),
        ];
        let mut second = first.clone();

        resolve_interface_ids(&mut first, &live).unwrap();
        resolve_interface_ids(&mut second, &live).unwrap();
        assert_eq!(first, second);

        // Re-running over an already resolved set changes nothing.
        let resolved = first.clone();
        resolve_interface_ids(&mut first, &live).unwrap();
        assert_eq!(first, resolved);
    }

    #[test]
    fn test_explicit_ports_are_honored_as_claims() {
        let live = vec![port("p1", "s1"), port("p2", "s1")];
        let mut desired = vec![
            DesiredInterface::on_subnet("s1").with_port("p1"),
            DesiredInterface::on_subnet("s1"),
        ];

        resolve_interface_ids(&mut desired, &live).unwrap();
        assert_eq!(desired[1].port_id.as_deref(), Some("p2"));
    }

    #[test]
    fn test_missing_subnet_vs_exhausted_pool() {
        let live = vec![port("p1", "s1")];

        let mut desired = vec![DesiredInterface::on_subnet("s9")];
        let err = resolve_interface_ids(&mut desired, &live).unwrap_err();
        assert!(matches!(err, ComputeError::NoInterfaceForSubnet { .. }));

        let mut desired = vec![
            DesiredInterface::on_subnet("s1"),
            DesiredInterface::on_subnet("s1"),
        ];
        let err = resolve_interface_ids(&mut desired, &live).unwrap_err();
        assert!(matches!(err, ComputeError::SubnetInterfacesExhausted { .. }));
    }
}

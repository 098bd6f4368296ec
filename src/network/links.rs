use log::debug;

use crate::error_handling::types::ResolutionError;
use crate::topology::types::{Lab, LinkKind, ResolvedLink};

/// Binds every link of `lab` to the host resources it occupies and records
/// each endpoint on its node.
///
/// Fails on the first endpoint naming a node the lab does not have: the
/// topology and the runtime state have diverged and the host side of that
/// link cannot be named reliably.
pub fn resolve_links(lab: &mut Lab) -> Result<(), ResolutionError> {
    for node in lab.nodes.values_mut() {
        node.endpoints.clear();
    }

    for idx in 0..lab.links.len() {
        let link = &lab.links[idx];
        let id = link.id();

        if link.a.is_special() {
            return Err(ResolutionError::InvalidEndpoint(format!(
                "link {} has no lab node endpoint",
                id
            )));
        }

        let endpoints: Vec<_> = [&link.a, &link.b]
            .into_iter()
            .filter(|e| !e.is_special())
            .cloned()
            .collect();
        for endpoint in &endpoints {
            if !lab.nodes.contains_key(&endpoint.node) {
                return Err(ResolutionError::UnknownEndpoint {
                    link: id,
                    node: endpoint.node.clone(),
                });
            }
        }

        let resolved = match link.kind {
            // both ends live in container namespaces
            LinkKind::Veth | LinkKind::Macvlan => ResolvedLink {
                host_interface: None,
                bridge: None,
            },
            LinkKind::Host => ResolvedLink {
                host_interface: Some(link.b.interface.clone()),
                bridge: None,
            },
            LinkKind::MgmtNet => {
                let Some(bridge) = lab.mgmt.bridge.clone() else {
                    return Err(ResolutionError::InvalidEndpoint(format!(
                        "link {} attaches to management network {} whose bridge is unresolved",
                        id, lab.mgmt.network
                    )));
                };
                ResolvedLink {
                    host_interface: Some(link.b.interface.clone()),
                    bridge: Some(bridge),
                }
            }
        };
        debug!("Resolved link {} to {:?}", id, resolved);

        for endpoint in endpoints {
            if let Some(node) = lab.nodes.get_mut(&endpoint.node) {
                node.endpoints.push(endpoint);
            }
        }
        lab.links[idx].resolved = Some(resolved);
    }
    Ok(())
}

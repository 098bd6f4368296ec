use log::{debug, info};

use crate::container_management::runtime::{ContainerRuntime, OpContext};
use crate::error_handling::types::ResolutionError;
use crate::topology::types::Lab;

/// Makes sure the lab's management network exists and records the host
/// bridge backing it in `lab.mgmt.bridge`.
///
/// Runs on teardown too: forwarding rule cleanup needs the concrete bridge
/// name, which the topology usually leaves to the runtime.
pub async fn resolve_management_network(
    ctx: &OpContext,
    runtime: &dyn ContainerRuntime,
    lab: &mut Lab,
) -> Result<(), ResolutionError> {
    debug!(
        "Resolving management network {} of lab {}",
        lab.mgmt.network, lab.name
    );
    let bridge = runtime
        .create_network(ctx, &lab.mgmt)
        .await
        .map_err(ResolutionError::ManagementNetwork)?;

    if let Some(declared) = &lab.mgmt.bridge {
        if declared != &bridge {
            info!(
                "Management network {} is backed by bridge {}, topology declares {}",
                lab.mgmt.network, bridge, declared
            );
        }
    }
    lab.mgmt.bridge = Some(bridge);
    Ok(())
}

use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::configuration::types::DEFAULT_STOP_TIMEOUT;
use crate::container_management::runtime::{ContainerRuntime, OpContext};
use crate::error_handling::types::{RuntimeError, TeardownError};
use crate::network::host::HostNetwork;
use crate::teardown::outcome::{FailureCause, NodeOutcome, TeardownOutcome};
use crate::topology::types::{Lab, Node};

/// Slack on top of the runtime's stop grace period before the stop call is abandoned.
const STOP_GRACE_MARGIN: Duration = Duration::from_secs(5);

/// Removes the containers of a lab with bounded parallelism, then its
/// management network.
#[derive(Clone)]
pub struct TeardownEngine {
    runtime: Arc<dyn ContainerRuntime>,
    host: Arc<dyn HostNetwork>,
    graceful: bool,
    stop_timeout: Duration,
}

/// Everything one worker needs, owned so it can move into the task.
struct NodeJob {
    runtime: Arc<dyn ContainerRuntime>,
    host: Arc<dyn HostNetwork>,
    ctx: OpContext,
    node: Node,
    host_interfaces: Vec<String>,
    graceful: bool,
    stop_timeout: Duration,
}

impl TeardownEngine {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, host: Arc<dyn HostNetwork>) -> Self {
        Self {
            runtime,
            host,
            graceful: false,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Stop each container, waiting at most `stop_timeout`, before removing it.
    pub fn with_graceful_stop(mut self, stop_timeout: Duration) -> Self {
        self.graceful = true;
        self.stop_timeout = stop_timeout;
        self
    }

    /// Tears down every targeted node of `lab`.
    ///
    /// `max_workers == 0` runs one worker per node; larger values are capped
    /// at the node count. The management network is
    /// removed once every dispatched node task has settled, unless
    /// `keep_mgmt_net` is set, the lab marks it as kept, or a node filter is
    /// active. Cancelling `ctx` stops dispatch; nodes never picked up are
    /// reported as [`FailureCause::NotDispatched`].
    pub async fn destroy(
        &self,
        ctx: &OpContext,
        lab: &Lab,
        max_workers: usize,
        keep_mgmt_net: bool,
    ) -> Result<TeardownOutcome, TeardownError> {
        let nodes = lab.target_nodes();
        let workers = if max_workers == 0 {
            nodes.len()
        } else {
            max_workers.min(nodes.len())
        }
        .max(1);
        info!(
            "Destroying lab {}: {} node(s), {} worker(s)",
            lab.name,
            nodes.len(),
            workers
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();
        let mut pending = BTreeSet::new();
        let mut outcomes = Vec::with_capacity(nodes.len());

        for node in nodes {
            // wait for a free worker before spawning so cancellation halts dispatch
            let permit = tokio::select! {
                biased;
                _ = ctx.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                warn!("Node {} not torn down: cancelled before dispatch", node.name);
                outcomes.push(NodeOutcome::failed(&node.name, FailureCause::NotDispatched));
                continue;
            };

            let job = NodeJob {
                runtime: Arc::clone(&self.runtime),
                host: Arc::clone(&self.host),
                ctx: ctx.clone(),
                node: node.clone(),
                host_interfaces: lab.host_interfaces_of(&node.name),
                graceful: self.graceful,
                stop_timeout: self.stop_timeout,
            };
            pending.insert(node.name.clone());
            set.spawn(async move {
                let _permit = permit;
                job.run().await
            });
        }

        // barrier: nothing touches the network before every node task settles
        while let Some(res) = set.join_next().await {
            match res {
                Ok(outcome) => {
                    pending.remove(&outcome.node);
                    outcomes.push(outcome);
                }
                Err(e) => error!("Node teardown task of lab {} failed: {}", lab.name, e),
            }
        }
        for node in pending {
            outcomes.push(NodeOutcome::failed(&node, FailureCause::TaskPanicked));
        }
        outcomes.sort_by(|a, b| a.node.cmp(&b.node));

        for outcome in &outcomes {
            for failure in &outcome.failures {
                error!("Lab {}: node {}: {}", lab.name, outcome.node, failure);
            }
        }

        let (network_removed, network_error) =
            self.remove_management_network(ctx, lab, keep_mgmt_net).await;

        TeardownOutcome {
            lab: lab.name.clone(),
            nodes: outcomes,
            network_removed,
            network_error,
            finished_at: Utc::now(),
        }
        .into_result()
    }

    async fn remove_management_network(
        &self,
        ctx: &OpContext,
        lab: &Lab,
        keep_mgmt_net: bool,
    ) -> (bool, Option<RuntimeError>) {
        if keep_mgmt_net || lab.mgmt.keep {
            debug!("Keeping management network {}", lab.mgmt.network);
            return (false, None);
        }
        if !lab.node_filter.is_empty() {
            debug!(
                "Node filter in use, keeping management network {}",
                lab.mgmt.network
            );
            return (false, None);
        }
        if ctx.is_cancelled() {
            warn!(
                "Cancelled, leaving management network {} of lab {} in place",
                lab.mgmt.network, lab.name
            );
            return (false, None);
        }

        let mut network_error = None;
        if let Some(bridge) = &lab.mgmt.bridge {
            if let Err(e) = self.host.remove_forwarding_rules(ctx, bridge).await {
                error!("Failed to remove forwarding rules for {}: {}", bridge, e);
                network_error = Some(e);
            }
        }

        match self.runtime.remove_network(ctx, &lab.mgmt).await {
            Ok(()) => {
                info!("Removed management network {}", lab.mgmt.network);
                (true, network_error)
            }
            Err(e) if e.is_not_found() => {
                debug!("Management network {} already gone", lab.mgmt.network);
                (true, network_error)
            }
            Err(RuntimeError::InUse(_)) => {
                warn!(
                    "Management network {} kept, in use by other containers",
                    lab.mgmt.network
                );
                (false, network_error)
            }
            Err(e) => {
                error!(
                    "Failed to remove management network {}: {}",
                    lab.mgmt.network, e
                );
                (false, Some(e))
            }
        }
    }
}

impl NodeJob {
    async fn run(self) -> NodeOutcome {
        let mut outcome = NodeOutcome::new(&self.node.name);

        if self.graceful {
            let stop_ctx = self.ctx.with_timeout(self.stop_timeout + STOP_GRACE_MARGIN);
            match self
                .runtime
                .stop_node(&stop_ctx, &self.node, self.stop_timeout)
                .await
            {
                Ok(()) => debug!("Stopped container {}", self.node.container_name),
                Err(e) if e.is_not_found() => {
                    debug!("Container {} already gone", self.node.container_name)
                }
                Err(RuntimeError::Timeout(_)) => {
                    warn!(
                        "Container {} did not stop within {:?}, removing it anyway",
                        self.node.container_name, self.stop_timeout
                    );
                    outcome.warnings.push(FailureCause::StopTimeout);
                }
                Err(e) => {
                    warn!(
                        "Failed to stop container {}: {}, removing it anyway",
                        self.node.container_name, e
                    );
                    outcome.warnings.push(FailureCause::StopFailed(e));
                }
            }
        }

        match self.runtime.remove_node(&self.ctx, &self.node).await {
            Ok(()) => info!("Removed container: {}", self.node.container_name),
            Err(e) if e.is_not_found() => {
                debug!(
                    "Container {} not found, nothing to remove",
                    self.node.container_name
                );
            }
            Err(e) => {
                outcome.failures.push(FailureCause::RemoveFailed(e));
                return outcome;
            }
        }

        for interface in &self.host_interfaces {
            if let Err(error) = self.host.delete_link(&self.ctx, interface).await {
                outcome.failures.push(FailureCause::HostLinkFailed {
                    interface: interface.clone(),
                    error,
                });
            }
        }
        outcome
    }
}

//! In-memory runtime used by the tests.
//!
//! Records every call in order, tracks how many node operations are in flight
//! at once, and can be told to fail or hang for specific containers.

use async_trait::async_trait;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::configuration::types::RuntimeConfig;
use crate::container_management::runtime::{ContainerRuntime, OpContext};
use crate::container_management::types::{ContainerRecord, GenericFilter};
use crate::error_handling::types::RuntimeError;
use crate::lab_discovery::labels;
use crate::topology::types::{ManagementNetwork, Node};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    List,
    CreateNetwork(String),
    Stop(String),
    Remove(String),
    RemoveNetwork(String),
}

#[derive(Debug, Default)]
pub struct MockRuntime {
    config: RuntimeConfig,
    containers: Mutex<Vec<ContainerRecord>>,
    networks: Mutex<HashMap<String, String>>,
    events: Mutex<Vec<MockEvent>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    op_delay: Duration,
    failing_removals: HashSet<String>,
    hanging_stops: HashSet<String>,
    failing_network_creation: bool,
    network_in_use: bool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Adds one running container per node name, labelled as deployed from
    /// `topo_file` with its artifacts under `lab_dir`.
    pub fn with_lab(self, lab: &str, topo_file: &Path, lab_dir: &Path, nodes: &[&str]) -> Self {
        {
            let mut containers = self.containers.lock().unwrap();
            for node in nodes {
                let mut labels_map = HashMap::new();
                labels_map.insert(labels::CONTAINERLAB.to_string(), lab.to_string());
                labels_map.insert(labels::NODE_NAME.to_string(), node.to_string());
                labels_map.insert(
                    labels::TOPO_FILE.to_string(),
                    topo_file.display().to_string(),
                );
                labels_map.insert(
                    labels::NODE_LAB_DIR.to_string(),
                    lab_dir.join(node).display().to_string(),
                );
                containers.push(ContainerRecord {
                    id: format!("mock-{}", &Uuid::new_v4().to_string()[..8]),
                    names: vec![format!("clab-{}-{}", lab, node)],
                    image: "alpine:latest".to_string(),
                    state: "running".to_string(),
                    labels: labels_map,
                });
            }
        }
        self
    }

    pub fn with_container(self, record: ContainerRecord) -> Self {
        self.containers.lock().unwrap().push(record);
        self
    }

    pub fn with_network(self, network: &str, bridge: &str) -> Self {
        self.networks
            .lock()
            .unwrap()
            .insert(network.to_string(), bridge.to_string());
        self
    }

    /// Every stop/remove call takes this long.
    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    pub fn failing_removal(mut self, container: &str) -> Self {
        self.failing_removals.insert(container.to_string());
        self
    }

    /// Stop calls for this container never complete on their own.
    pub fn hanging_stop(mut self, container: &str) -> Self {
        self.hanging_stops.insert(container.to_string());
        self
    }

    pub fn failing_network_creation(mut self) -> Self {
        self.failing_network_creation = true;
        self
    }

    /// Network removal fails as if containers of another lab were attached.
    pub fn network_in_use(mut self) -> Self {
        self.network_in_use = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &MockEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn container_count(&self) -> usize {
        self.containers.lock().unwrap().len()
    }

    pub fn has_network(&self, network: &str) -> bool {
        self.networks.lock().unwrap().contains_key(network)
    }

    fn record(&self, event: MockEvent) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(event);
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn position(&self, node: &Node) -> Option<usize> {
        let handle = node.runtime_handle();
        self.containers
            .lock()
            .unwrap()
            .iter()
            .position(|c| c.id == handle || c.has_name(handle))
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    async fn list_containers(
        &self,
        ctx: &OpContext,
        filters: &[GenericFilter],
    ) -> Result<Vec<ContainerRecord>, RuntimeError> {
        self.record(MockEvent::List);
        ctx.run("list containers", async {
            Ok(self
                .containers
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.matches_all(filters))
                .cloned()
                .collect())
        })
        .await
    }

    async fn create_network(
        &self,
        ctx: &OpContext,
        mgmt: &ManagementNetwork,
    ) -> Result<String, RuntimeError> {
        self.record(MockEvent::CreateNetwork(mgmt.network.clone()));
        ctx.run("create network", async {
            if self.failing_network_creation {
                return Err(RuntimeError::CommandFailed(format!(
                    "cannot create network {}",
                    mgmt.network
                )));
            }
            let mut networks = self.networks.lock().unwrap();
            let bridge = networks
                .entry(mgmt.network.clone())
                .or_insert_with(|| {
                    mgmt.bridge
                        .clone()
                        .unwrap_or_else(|| format!("br-{}", &Uuid::new_v4().simple().to_string()[..12]))
                })
                .clone();
            Ok(bridge)
        })
        .await
    }

    async fn stop_node(
        &self,
        ctx: &OpContext,
        node: &Node,
        _timeout: Duration,
    ) -> Result<(), RuntimeError> {
        self.record(MockEvent::Stop(node.container_name.clone()));
        self.enter();
        let res = ctx
            .run("stop node", async {
                if self.hanging_stops.contains(&node.container_name) {
                    std::future::pending::<()>().await;
                }
                tokio::time::sleep(self.op_delay).await;
                match self.position(node) {
                    Some(_) => Ok(()),
                    None => Err(RuntimeError::NotFound(node.container_name.clone())),
                }
            })
            .await;
        self.leave();
        res
    }

    async fn remove_node(&self, ctx: &OpContext, node: &Node) -> Result<(), RuntimeError> {
        self.enter();
        let res = ctx
            .run("remove node", async {
                tokio::time::sleep(self.op_delay).await;
                if self.failing_removals.contains(&node.container_name) {
                    return Err(RuntimeError::CommandFailed(format!(
                        "cannot remove {}",
                        node.container_name
                    )));
                }
                match self.position(node) {
                    Some(idx) => {
                        self.containers.lock().unwrap().remove(idx);
                        debug!("MockRuntime: removed {}", node.container_name);
                        Ok(())
                    }
                    None => Err(RuntimeError::NotFound(node.container_name.clone())),
                }
            })
            .await;
        self.leave();
        // recorded on completion so ordering checks see settled removals
        self.record(MockEvent::Remove(node.container_name.clone()));
        res
    }

    async fn remove_network(
        &self,
        ctx: &OpContext,
        mgmt: &ManagementNetwork,
    ) -> Result<(), RuntimeError> {
        self.record(MockEvent::RemoveNetwork(mgmt.network.clone()));
        ctx.run("remove network", async {
            if mgmt.keep {
                return Ok(());
            }
            if self.network_in_use {
                return Err(RuntimeError::InUse(mgmt.network.clone()));
            }
            match self.networks.lock().unwrap().remove(&mgmt.network) {
                Some(_) => {
                    info!("MockRuntime: removed network {}", mgmt.network);
                    Ok(())
                }
                None => Err(RuntimeError::NotFound(mgmt.network.clone())),
            }
        })
        .await
    }
}

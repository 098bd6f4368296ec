use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::configuration::types::DestroyOptions;
use crate::error_handling::types::ConfigError;
use crate::lab_discovery::LabMembership;
use crate::topology::loader::{self, TopologyFile};
use crate::topology::types::*;

/// Reconstructs a [`Lab`] from a topology file plus invocation options.
///
/// ```ignore
/// let lab = LabBuilder::new(Path::new("srl01.clab.yml"))
///     .with_node_filter(vec!["leaf1".into()])
///     .with_skipped_bind_paths_check()
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct LabBuilder {
    topology_path: PathBuf,
    vars_file: Option<PathBuf>,
    node_filter: Vec<String>,
    keep_mgmt_net: bool,
    skip_bind_check: bool,
    lab_dir: Option<PathBuf>,
}

impl LabBuilder {
    pub fn new(topology_path: &Path) -> Self {
        Self {
            topology_path: topology_path.to_path_buf(),
            vars_file: None,
            node_filter: Vec::new(),
            keep_mgmt_net: false,
            skip_bind_check: false,
            lab_dir: None,
        }
    }

    /// Builder preset for teardown: every option override applied and bind
    /// path validation disabled.
    pub fn for_destroy(topology_path: &Path, options: &DestroyOptions) -> Self {
        let mut builder = Self::new(topology_path)
            .with_node_filter(options.node_filter.clone())
            // bind sources are irrelevant for destroy and may be gone already
            .with_skipped_bind_paths_check();
        if let Some(vars) = &options.vars_file {
            builder = builder.with_vars_file(vars);
        }
        if options.keep_mgmt_net {
            builder = builder.with_keep_mgmt_net();
        }
        builder
    }

    pub fn with_vars_file(mut self, vars_file: &Path) -> Self {
        self.vars_file = Some(vars_file.to_path_buf());
        self
    }

    pub fn with_node_filter(mut self, node_filter: Vec<String>) -> Self {
        self.node_filter = node_filter;
        self
    }

    pub fn with_keep_mgmt_net(mut self) -> Self {
        self.keep_mgmt_net = true;
        self
    }

    pub fn with_skipped_bind_paths_check(mut self) -> Self {
        self.skip_bind_check = true;
        self
    }

    /// Lab directory taken from container labels. It replaces the computed
    /// default when it exists on disk; an empty path is ignored.
    pub fn with_lab_dir(mut self, lab_dir: &Path) -> Self {
        if !lab_dir.as_os_str().is_empty() {
            self.lab_dir = Some(lab_dir.to_path_buf());
        }
        self
    }

    /// Loads only the lab name, used to scope discovery.
    pub fn lab_name(&self) -> Result<String, ConfigError> {
        Ok(self.load()?.name)
    }

    pub fn build(self) -> Result<Lab, ConfigError> {
        let topo = self.load()?;
        self.assemble(topo)
    }

    fn load(&self) -> Result<TopologyFile, ConfigError> {
        loader::load(&self.topology_path, self.vars_file.as_deref())
    }

    fn assemble(self, topo: TopologyFile) -> Result<Lab, ConfigError> {
        let prefix = topo.prefix.clone().unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let mut nodes = BTreeMap::new();
        for (name, spec) in &topo.topology.nodes {
            let spec = spec.clone().unwrap_or_default();
            let mut node = Node::new(
                name,
                spec.kind.as_deref().unwrap_or("linux"),
                Lab::container_name(&prefix, &topo.name, name),
            );
            node.image = spec.image;
            node.binds = spec.binds;
            nodes.insert(name.clone(), node);
        }

        for wanted in &self.node_filter {
            if !nodes.contains_key(wanted) {
                return Err(ConfigError::UnknownNode(format!(
                    "node-filter references {} which is not defined in lab {}",
                    wanted, topo.name
                )));
            }
        }

        let mut links = Vec::with_capacity(topo.topology.links.len());
        for spec in &topo.topology.links {
            let [first, second] = spec.endpoints.as_slice() else {
                return Err(ConfigError::InvalidTopology(format!(
                    "link {:?} must have exactly two endpoints",
                    spec.endpoints
                )));
            };
            let parse = |raw: &String| {
                Endpoint::parse(raw).ok_or_else(|| {
                    ConfigError::InvalidTopology(format!("malformed link endpoint {}", raw))
                })
            };
            links.push(Link::new(parse(first)?, parse(second)?));
        }

        let mgmt_spec = topo.mgmt.clone().unwrap_or_default();
        let mgmt = ManagementNetwork {
            network: mgmt_spec
                .network
                .unwrap_or_else(|| DEFAULT_MGMT_NETWORK.to_string()),
            bridge: mgmt_spec.bridge,
            ipv4_subnet: mgmt_spec.ipv4_subnet,
            keep: self.keep_mgmt_net,
        };

        let lab = Lab {
            lab_dir: self.resolve_lab_dir(&topo.name),
            name: topo.name,
            prefix,
            topology_file: self.topology_path,
            mgmt,
            nodes,
            links,
            node_filter: self.node_filter,
            skip_bind_check: self.skip_bind_check,
        };

        if !lab.skip_bind_check {
            validate_bind_paths(&lab)?;
        }

        debug!(
            "Built lab {} with {} nodes and {} links, lab dir {}",
            lab.name,
            lab.nodes.len(),
            lab.links.len(),
            lab.lab_dir.display()
        );
        Ok(lab)
    }

    fn resolve_lab_dir(&self, lab_name: &str) -> PathBuf {
        let topo_dir = match self.topology_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let default = topo_dir.join(format!("clab-{}", lab_name));

        match &self.lab_dir {
            Some(dir) if dir.exists() => {
                debug!(
                    "Using lab directory {} from container labels instead of {}",
                    dir.display(),
                    default.display()
                );
                dir.clone()
            }
            Some(dir) => {
                debug!(
                    "Lab directory {} from container labels does not exist, using {}",
                    dir.display(),
                    default.display()
                );
                default
            }
            None => default,
        }
    }
}

fn validate_bind_paths(lab: &Lab) -> Result<(), ConfigError> {
    for node in lab.nodes.values() {
        for bind in &node.binds {
            let source = bind.split(':').next().unwrap_or_default();
            let source = if Path::new(source).is_absolute() {
                PathBuf::from(source)
            } else {
                lab.topology_file
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(source)
            };
            if !source.exists() {
                return Err(ConfigError::InvalidTopology(format!(
                    "node {}: bind source {} does not exist",
                    node.name,
                    source.display()
                )));
            }
        }
    }
    Ok(())
}

/// Attaches runtime identities to the lab's nodes.
///
/// Nodes without a container are marked [`NodeState::Absent`]. Containers
/// labelled with this lab but missing from the topology are added as extra
/// nodes so they are removed too, unless a node filter is active.
pub fn bind_containers(lab: &mut Lab, members: &[LabMembership]) {
    for node in lab.nodes.values_mut() {
        node.state = NodeState::Absent;
    }

    for member in members {
        let Some(node_name) = &member.node else {
            warn!(
                "Container {} of lab {} has no node name label",
                member.container_id, lab.name
            );
            continue;
        };
        let state = if member.state == "running" {
            NodeState::Running
        } else {
            NodeState::Stopped
        };

        match lab.nodes.get_mut(node_name) {
            Some(node) => {
                node.runtime_id = Some(member.container_id.clone());
                node.state = state;
            }
            None if lab.node_filter.is_empty() => {
                warn!(
                    "Container {} belongs to lab {} but node {} is not in the topology, removing it as well",
                    member.container_id, lab.name, node_name
                );
                let container_name = member
                    .container_name
                    .clone()
                    .unwrap_or_else(|| member.container_id.clone());
                let mut node = Node::new(node_name, "unknown", container_name);
                node.runtime_id = Some(member.container_id.clone());
                node.state = state;
                lab.nodes.insert(node_name.clone(), node);
            }
            None => {}
        }
    }
}

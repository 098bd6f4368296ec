//! In-memory model of one lab: nodes, links and the management network.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Endpoint node name for links into the host namespace.
pub const HOST_NODE: &str = "host";
/// Endpoint node name for links attached to the management bridge.
pub const MGMT_NET_NODE: &str = "mgmt-net";
/// Endpoint node name for macvlan links on a host parent interface.
pub const MACVLAN_NODE: &str = "macvlan";

pub const DEFAULT_PREFIX: &str = "clab";
pub const DEFAULT_MGMT_NETWORK: &str = "clab";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Declared in the topology, runtime state not looked up yet.
    Declared,
    Running,
    Stopped,
    /// No container found for this node.
    Absent,
}

/// One emulated network element, realised as a container.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: String,
    pub image: Option<String>,
    /// Name the container was deployed under.
    pub container_name: String,
    /// Identifier reported by the runtime, once known.
    pub runtime_id: Option<String>,
    pub state: NodeState,
    /// Interfaces of this node that take part in links.
    pub endpoints: Vec<Endpoint>,
    pub binds: Vec<String>,
}

impl Node {
    pub fn new(name: &str, kind: &str, container_name: String) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            image: None,
            container_name,
            runtime_id: None,
            state: NodeState::Declared,
            endpoints: Vec::new(),
            binds: Vec::new(),
        }
    }

    /// Handle passed to the runtime: the container id when known, the
    /// container name otherwise.
    pub fn runtime_handle(&self) -> &str {
        self.runtime_id.as_deref().unwrap_or(&self.container_name)
    }
}

/// `node:interface` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub node: String,
    pub interface: String,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Option<Self> {
        let (node, interface) = raw.trim().split_once(':')?;
        if node.is_empty() || interface.is_empty() {
            return None;
        }
        Some(Self {
            node: node.to_string(),
            interface: interface.to_string(),
        })
    }

    /// `host`, `mgmt-net` and `macvlan` endpoints are not lab nodes.
    pub fn is_special(&self) -> bool {
        matches!(self.node.as_str(), HOST_NODE | MGMT_NET_NODE | MACVLAN_NODE)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.interface)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// veth pair between two lab nodes.
    Veth,
    /// veth pair with one end in the host namespace.
    Host,
    /// veth pair with the host end enslaved to the management bridge.
    MgmtNet,
    Macvlan,
}

/// Host level resources a link is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Interface living in the host namespace, removed after its node.
    pub host_interface: Option<String>,
    /// Bridge the host interface is attached to.
    pub bridge: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub a: Endpoint,
    pub b: Endpoint,
    pub kind: LinkKind,
    pub resolved: Option<ResolvedLink>,
}

impl Link {
    /// Orders the endpoints so a special endpoint, if any, is always `b`.
    pub fn new(first: Endpoint, second: Endpoint) -> Self {
        let (a, b) = if first.is_special() && !second.is_special() {
            (second, first)
        } else {
            (first, second)
        };
        let kind = match b.node.as_str() {
            HOST_NODE => LinkKind::Host,
            MGMT_NET_NODE => LinkKind::MgmtNet,
            MACVLAN_NODE => LinkKind::Macvlan,
            _ => LinkKind::Veth,
        };
        Self {
            a,
            b,
            kind,
            resolved: None,
        }
    }

    pub fn id(&self) -> String {
        format!("{}--{}", self.a, self.b)
    }

    /// Lab node names this link touches.
    pub fn node_names(&self) -> Vec<&str> {
        [&self.a, &self.b]
            .into_iter()
            .filter(|e| !e.is_special())
            .map(|e| e.node.as_str())
            .collect()
    }
}

/// The network every node of a lab shares for management access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementNetwork {
    /// Runtime network name.
    pub network: String,
    /// Host bridge backing the network, filled in by resolution when not
    /// given in the topology.
    pub bridge: Option<String>,
    pub ipv4_subnet: Option<String>,
    /// Leave the network in place on destroy.
    pub keep: bool,
}

impl Default for ManagementNetwork {
    fn default() -> Self {
        Self {
            network: DEFAULT_MGMT_NETWORK.to_string(),
            bridge: None,
            ipv4_subnet: None,
            keep: false,
        }
    }
}

/// One topology instance, rebuilt for every command run.
#[derive(Debug, Clone, PartialEq)]
pub struct Lab {
    pub name: String,
    pub prefix: String,
    pub topology_file: PathBuf,
    /// Directory holding the lab's generated artifacts.
    pub lab_dir: PathBuf,
    pub mgmt: ManagementNetwork,
    pub nodes: BTreeMap<String, Node>,
    pub links: Vec<Link>,
    /// When non-empty only these nodes are acted upon.
    pub node_filter: Vec<String>,
    pub skip_bind_check: bool,
}

impl Lab {
    pub fn container_name(prefix: &str, lab: &str, node: &str) -> String {
        if prefix.is_empty() {
            node.to_string()
        } else {
            format!("{}-{}-{}", prefix, lab, node)
        }
    }

    pub fn is_targeted(&self, node: &str) -> bool {
        self.node_filter.is_empty() || self.node_filter.iter().any(|n| n == node)
    }

    /// Nodes selected by the node filter.
    pub fn target_nodes(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| self.is_targeted(&n.name))
            .collect()
    }

    /// Links whose lab nodes are all selected by the node filter.
    pub fn target_links(&self) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(|l| l.node_names().iter().all(|n| self.is_targeted(n)))
    }

    /// Host side interfaces that have to go once `node` is removed.
    pub fn host_interfaces_of(&self, node: &str) -> Vec<String> {
        self.target_links()
            .filter(|l| l.a.node == node)
            .filter_map(|l| l.resolved.as_ref())
            .filter_map(|r| r.host_interface.clone())
            .collect()
    }
}

#[cfg(test)]
impl Lab {
    /// A lab with no nodes, links or node filter, for tests.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            topology_file: PathBuf::from(format!("{}.clab.yml", name)),
            lab_dir: PathBuf::from(format!("clab-{}", name)),
            mgmt: ManagementNetwork::default(),
            nodes: BTreeMap::new(),
            links: Vec::new(),
            node_filter: Vec::new(),
            skip_bind_check: true,
        }
    }

    /// Adds a node named `name` with its default container name.
    pub fn with_node(mut self, name: &str) -> Self {
        let container_name = Self::container_name(&self.prefix, &self.name, name);
        self.nodes
            .insert(name.to_string(), Node::new(name, "linux", container_name));
        self
    }

    pub fn with_link(mut self, a: &str, b: &str) -> Self {
        let parse = |raw: &str| Endpoint::parse(raw).unwrap();
        self.links.push(Link::new(parse(a), parse(b)));
        self
    }
}

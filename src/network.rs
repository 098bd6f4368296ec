//! Network/link resolution and host side cleanup.
//!
//! Components:
//! - `mgmt_net`: resolves the management network and its host bridge.
//! - `links`: binds topology links to the host interfaces they occupy.
//! - `host`: [`HostNetwork`] operations on the host namespace (`ip`, `iptables`).

pub mod host;
pub mod links;
pub mod mgmt_net;

pub use host::{HostNetwork, IpHostNetwork};
pub use links::resolve_links;
pub use mgmt_net::resolve_management_network;

//! Topology skeleton and lab context construction.
//!
//! Components:
//! - `types`: [`Lab`], [`Node`], [`Link`], [`ManagementNetwork`].
//! - `loader`: YAML topology file reading with variable substitution.
//! - `builder`: [`LabBuilder`], applying invocation options to a loaded topology.

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::{bind_containers, LabBuilder};
pub use types::{Endpoint, Lab, Link, LinkKind, ManagementNetwork, Node, NodeState};

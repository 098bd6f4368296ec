//! Ownership labels written onto every lab container at deploy time.
//!
//! They are an external contract: teardown only reads them.

/// Lab membership marker, its value is the lab name.
pub const CONTAINERLAB: &str = "containerlab";
/// Name of the node inside its lab.
pub const NODE_NAME: &str = "clab-node-name";
/// Absolute path of the topology file the lab was deployed from.
pub const TOPO_FILE: &str = "clab-topo-file";
/// Per-node directory inside the lab directory, i.e. `<lab dir>/<node>`.
pub const NODE_LAB_DIR: &str = "clab-node-lab-dir";

//! Label/filter index
//!
//! Turns the ownership labels on running containers into lab membership:
//! which labs exist, where their topology files and lab directories are, and
//! which container backs which node.
//!
//! Components:
//! - `labels`: label keys written at deploy time.
//! - `filter`: discovery filters scoped by the ownership label.
//! - `label_index`: discovery and grouping logic.

pub mod filter;
pub mod label_index;
pub mod labels;

pub use label_index::{Discovery, DiscoveryTarget, LabMembership, LabelIndex};

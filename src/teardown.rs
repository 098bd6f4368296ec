//! Bounded teardown engine.
//!
//! Components:
//! - `engine`: [`TeardownEngine`], worker pool removing a lab's nodes and then its management network.
//! - `outcome`: per-node and per-lab results, folded into a `TeardownError` on failure.

pub mod engine;
pub mod outcome;

pub use engine::TeardownEngine;
pub use outcome::{FailureCause, NodeFailure, NodeOutcome, TeardownOutcome};

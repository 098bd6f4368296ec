//! Multi-lab batch orchestration.
//!
//! Components:
//! - `controller_handler`: [`Controller`], discovery plus sequential per-lab teardown.
//! - `lab_dir`: lab working directory cleanup and the `clab-*` fallback heuristic.

pub mod controller_handler;
pub mod lab_dir;

pub use controller_handler::{BatchReport, Controller};

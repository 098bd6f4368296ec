//! Runtime abstraction.
//!
//! This module exposes a uniform, cancellation aware interface over container
//! engines. Backends implement [`ContainerRuntime`] and are selected by name
//! through a [`RuntimeRegistry`] when a lab is built.
//!
//! Re-exports:
//! - [`ContainerRuntime`], [`OpContext`]: the capability interface and its call context.
//! - [`RuntimeRegistry`]: name to backend factory map.
//! - [`CliRuntime`]: docker/podman backend driving the engine's CLI.
//! - [`ContainerRecord`], [`GenericFilter`]: listing results and label predicates.
//!
//! Example (non-running):
//! ```ignore
//! use labctl::container_management::{GenericFilter, OpContext, RuntimeRegistry};
//!
//! let runtime = RuntimeRegistry::default().create("docker", &Default::default())?;
//! let filters = [GenericFilter::label_exists("containerlab")];
//! let containers = runtime.list_containers(&OpContext::background(), &filters).await?;
//! println!("found {} lab containers", containers.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli_runtime;
#[cfg(test)]
pub mod mock_runtime;
pub mod registry;
pub mod runtime;
pub mod types;

pub use cli_runtime::CliRuntime;
pub use registry::RuntimeRegistry;
pub use runtime::{ContainerRuntime, OpContext};
pub use types::{ContainerRecord, FilterOperator, FilterType, GenericFilter};

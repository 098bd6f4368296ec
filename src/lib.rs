pub mod configuration;
pub mod container_management;
pub mod controller;
pub mod error_handling;
pub mod lab_discovery;
pub mod network;
pub mod teardown;
pub mod topology;

pub use controller::Controller;
pub use error_handling::types::DestroyError;

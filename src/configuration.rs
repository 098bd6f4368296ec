pub mod config;
pub mod types;

pub use config::{Cli, Command, Config, DestroyArgs};
pub use types::{DestroyOptions, FileDefaults, RuntimeConfig};

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error_handling::types::ConfigError;

pub const DEFAULT_RUNTIME: &str = "docker";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Options handed to the runtime backend factory.
///
/// The core never looks inside beyond building it; each backend decides what
/// `debug`, `timeout` and `graceful_shutdown` mean for its own wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub debug: bool,
    pub timeout: Duration,
    pub graceful_shutdown: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            timeout: DEFAULT_TIMEOUT,
            graceful_shutdown: false,
        }
    }
}

/// Immutable set of options for one `destroy` invocation.
///
/// Built once from the command line (and the optional defaults file) and
/// passed by reference to every component.
///
/// # Fields Overview
///
/// - `all`: destroy every lab discovered on the runtime
/// - `cleanup`: remove the lab directory after teardown, cannot be combined with `node_filter`
/// - `graceful`: stop containers before removing them
/// - `max_workers`: bound on concurrent node teardowns, `0` means one worker per node
/// - `keep_mgmt_net`: leave the management network in place
/// - `node_filter`: restrict teardown to these node names
/// - `topology`: explicit topology file
/// - `vars_file`: variables substituted into the topology file
/// - `timeout`: deadline for every runtime operation
/// - `stop_timeout`: how long a graceful stop may take before removal proceeds
/// - `runtime`: name of the container runtime backend
/// - `debug`: verbose runtime output
#[derive(Debug, Clone, PartialEq)]
pub struct DestroyOptions {
    pub all: bool,
    pub cleanup: bool,
    pub graceful: bool,
    pub max_workers: usize,
    pub keep_mgmt_net: bool,
    pub node_filter: Vec<String>,
    pub topology: Option<PathBuf>,
    pub vars_file: Option<PathBuf>,
    pub timeout: Duration,
    pub stop_timeout: Duration,
    pub runtime: String,
    pub debug: bool,
}

impl Default for DestroyOptions {
    fn default() -> Self {
        Self {
            all: false,
            cleanup: false,
            graceful: false,
            max_workers: 0,
            keep_mgmt_net: false,
            node_filter: Vec::new(),
            topology: None,
            vars_file: None,
            timeout: DEFAULT_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            runtime: DEFAULT_RUNTIME.to_string(),
            debug: false,
        }
    }
}

impl DestroyOptions {
    /// Rejects option combinations that make no sense before any runtime is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // cleanup doesn't make sense with node-filter
        if self.cleanup && !self.node_filter.is_empty() {
            return Err(ConfigError::MutuallyExclusive(
                "cleanup cannot be used with node-filter".to_string(),
            ));
        }
        if self.node_filter.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::MalformedFilter(
                "node-filter contains an empty node name".to_string(),
            ));
        }
        Ok(())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            debug: self.debug,
            timeout: self.timeout,
            graceful_shutdown: self.graceful,
        }
    }
}

/// Defaults read from an optional TOML file; command-line flags win.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileDefaults {
    pub runtime: Option<String>,
    pub timeout_secs: Option<u64>,
    pub stop_timeout_secs: Option<u64>,
    pub max_workers: Option<usize>,
    pub graceful: Option<bool>,
    pub keep_mgmt_net: Option<bool>,
}

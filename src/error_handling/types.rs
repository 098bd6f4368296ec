use std::fmt;

use crate::teardown::outcome::NodeFailure;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    YamlError(String),
    MutuallyExclusive(String),
    MalformedFilter(String),
    UnknownNode(String),
    InvalidTopology(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::YamlError(e) => write!(f, "YAML parsing error: {}", e),
            ConfigError::MutuallyExclusive(e) => write!(f, "Conflicting options: {}", e),
            ConfigError::MalformedFilter(e) => write!(f, "Malformed filter: {}", e),
            ConfigError::UnknownNode(e) => write!(f, "Unknown node: {}", e),
            ConfigError::InvalidTopology(e) => write!(f, "Invalid topology: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum RuntimeError {
    UnknownRuntime(String),
    RuntimeNotAvailable(String),
    NotFound(String),
    /// The object is still referenced, e.g. a network with attached containers.
    InUse(String),
    CommandFailed(String),
    ParseError(String),
    Timeout(String),
    Cancelled,
    IoError(std::io::Error),
}

impl RuntimeError {
    /// Missing objects count as already removed during teardown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnknownRuntime(e) => write!(f, "Unknown container runtime: {}", e),
            RuntimeError::RuntimeNotAvailable(e) => {
                write!(f, "Container runtime not available: {}", e)
            }
            RuntimeError::NotFound(e) => write!(f, "Not found: {}", e),
            RuntimeError::InUse(e) => write!(f, "Still in use: {}", e),
            RuntimeError::CommandFailed(e) => write!(f, "Runtime command failed: {}", e),
            RuntimeError::ParseError(e) => write!(f, "Runtime output parsing error: {}", e),
            RuntimeError::Timeout(e) => write!(f, "Runtime operation timed out: {}", e),
            RuntimeError::Cancelled => write!(f, "Runtime operation cancelled"),
            RuntimeError::IoError(e) => write!(f, "Runtime IO error: {}", e),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::IoError(err)
    }
}

#[derive(Debug)]
pub enum DiscoveryError {
    NoLabsFound,
    /// Containers of the lab exist but none records its topology file.
    MissingTopology(String),
    InvalidFilter(ConfigError),
    RuntimeError(RuntimeError),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::NoLabsFound => write!(f, "no containerlab labs found"),
            DiscoveryError::MissingTopology(lab) => write!(
                f,
                "containers of lab {} carry no topology file label, pass the topology with --topo",
                lab
            ),
            DiscoveryError::InvalidFilter(e) => write!(f, "Invalid discovery filter: {}", e),
            DiscoveryError::RuntimeError(e) => write!(f, "Discovery failed: {}", e),
        }
    }
}

impl std::error::Error for DiscoveryError {}

impl From<ConfigError> for DiscoveryError {
    fn from(err: ConfigError) -> Self {
        DiscoveryError::InvalidFilter(err)
    }
}

impl From<RuntimeError> for DiscoveryError {
    fn from(err: RuntimeError) -> Self {
        DiscoveryError::RuntimeError(err)
    }
}

#[derive(Debug)]
pub enum ResolutionError {
    ManagementNetwork(RuntimeError),
    InvalidEndpoint(String),
    UnknownEndpoint { link: String, node: String },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::ManagementNetwork(e) => {
                write!(f, "Management network resolution failed: {}", e)
            }
            ResolutionError::InvalidEndpoint(e) => write!(f, "Invalid link endpoint: {}", e),
            ResolutionError::UnknownEndpoint { link, node } => write!(
                f,
                "Link resolution failed: link {} references node {} which is not part of the lab",
                link, node
            ),
        }
    }
}

impl std::error::Error for ResolutionError {}

/// Everything that went wrong while tearing down one lab.
#[derive(Debug)]
pub struct TeardownError {
    pub lab: String,
    pub node_failures: Vec<NodeFailure>,
    pub network_error: Option<RuntimeError>,
}

impl fmt::Display for TeardownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lab {}: {} node(s) failed to be removed",
            self.lab,
            self.node_failures.len()
        )?;
        for failure in &self.node_failures {
            write!(f, "; {}", failure)?;
        }
        if let Some(e) = &self.network_error {
            write!(f, "; management network: {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownError {}

/// Failure of a single lab within a batch.
#[derive(Debug)]
pub enum LabError {
    Build(ConfigError),
    Resolution(ResolutionError),
    Teardown(TeardownError),
}

impl fmt::Display for LabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabError::Build(e) => write!(f, "Lab build error: {}", e),
            LabError::Resolution(e) => write!(f, "Resolution error: {}", e),
            LabError::Teardown(e) => write!(f, "Teardown error: {}", e),
        }
    }
}

impl std::error::Error for LabError {}

impl From<ConfigError> for LabError {
    fn from(err: ConfigError) -> Self {
        LabError::Build(err)
    }
}

impl From<ResolutionError> for LabError {
    fn from(err: ResolutionError) -> Self {
        LabError::Resolution(err)
    }
}

impl From<TeardownError> for LabError {
    fn from(err: TeardownError) -> Self {
        LabError::Teardown(err)
    }
}

#[derive(Debug)]
pub enum DestroyError {
    ConfigurationError(ConfigError),
    DiscoveryError(DiscoveryError),
    RuntimeError(RuntimeError),
    LabsFailed(usize),
}

impl fmt::Display for DestroyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestroyError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            DestroyError::DiscoveryError(e) => write!(f, "{}", e),
            DestroyError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
            DestroyError::LabsFailed(count) => write!(
                f,
                "error(s) occurred during the deletion of {} lab(s). Check log messages",
                count
            ),
        }
    }
}

impl std::error::Error for DestroyError {}

impl From<ConfigError> for DestroyError {
    fn from(err: ConfigError) -> Self {
        DestroyError::ConfigurationError(err)
    }
}

impl From<DiscoveryError> for DestroyError {
    fn from(err: DiscoveryError) -> Self {
        DestroyError::DiscoveryError(err)
    }
}

impl From<RuntimeError> for DestroyError {
    fn from(err: RuntimeError) -> Self {
        DestroyError::RuntimeError(err)
    }
}

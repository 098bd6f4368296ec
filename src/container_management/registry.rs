use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use crate::configuration::types::RuntimeConfig;
use crate::container_management::cli_runtime::CliRuntime;
use crate::container_management::runtime::ContainerRuntime;
use crate::error_handling::types::RuntimeError;

pub type RuntimeFactory =
    Box<dyn Fn(&RuntimeConfig) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> + Send + Sync>;

/// Maps backend names to constructors.
///
/// Backends are added with [`RuntimeRegistry::register`]; selection happens
/// once per invocation through [`RuntimeRegistry::create`].
pub struct RuntimeRegistry {
    factories: HashMap<String, RuntimeFactory>,
}

impl RuntimeRegistry {
    /// A registry without any backend.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&RuntimeConfig) -> Result<Arc<dyn ContainerRuntime>, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        debug!("Registering container runtime backend {}", name);
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn create(
        &self,
        name: &str,
        config: &RuntimeConfig,
    ) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownRuntime(name.to_string()))?;
        factory(config)
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for binary in ["docker", "podman"] {
            registry.register(binary, move |config| {
                let runtime = CliRuntime::new(binary, config.clone())?;
                Ok(Arc::new(runtime) as Arc<dyn ContainerRuntime>)
            });
        }
        registry
    }
}

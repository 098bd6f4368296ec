//! Reads the parts of a topology file teardown cares about.

use log::debug;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error_handling::types::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopologyFile {
    pub name: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub mgmt: Option<MgmtSpec>,
    pub topology: TopologySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MgmtSpec {
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub bridge: Option<String>,
    #[serde(default)]
    pub ipv4_subnet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TopologySpec {
    /// Node bodies may be empty (`n1:`), hence the `Option`.
    #[serde(default)]
    pub nodes: BTreeMap<String, Option<NodeSpec>>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub binds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkSpec {
    pub endpoints: Vec<String>,
}

/// Loads `path`, substituting `{{ .var }}` placeholders from `vars_file` first.
pub fn load(path: &Path, vars_file: Option<&Path>) -> Result<TopologyFile, ConfigError> {
    debug!("Loading topology file {}", path.display());
    let raw = std::fs::read_to_string(path)?;

    let vars = match vars_file {
        Some(vars_path) => read_vars(vars_path)?,
        None => HashMap::new(),
    };
    let rendered = substitute_vars(&raw, &vars)?;

    let topo: TopologyFile =
        serde_yaml::from_str(&rendered).map_err(|e| ConfigError::YamlError(e.to_string()))?;
    if topo.name.trim().is_empty() {
        return Err(ConfigError::InvalidTopology(format!(
            "{}: lab name must not be empty",
            path.display()
        )));
    }
    Ok(topo)
}

/// Reads a flat YAML mapping of variable name to scalar value.
pub fn read_vars(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let values: HashMap<String, serde_yaml::Value> =
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::YamlError(e.to_string()))?;

    let mut vars = HashMap::with_capacity(values.len());
    for (key, value) in values {
        let rendered = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            other => {
                return Err(ConfigError::InvalidTopology(format!(
                    "variable {} must be a scalar, got {:?}",
                    key, other
                )))
            }
        };
        vars.insert(key, rendered);
    }
    Ok(vars)
}

/// Replaces every `{{ .name }}` with its value. Unknown names are an error.
pub fn substitute_vars(raw: &str, vars: &HashMap<String, String>) -> Result<String, ConfigError> {
    let re = Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
        .map_err(|e| ConfigError::InvalidTopology(e.to_string()))?;

    let mut missing = Vec::new();
    let rendered = re.replace_all(raw, |caps: &Captures| match vars.get(&caps[1]) {
        Some(v) => v.clone(),
        None => {
            missing.push(caps[1].to_string());
            caps[0].to_string()
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::InvalidTopology(format!(
            "undefined topology variable(s): {}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

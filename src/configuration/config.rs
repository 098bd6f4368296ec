use super::types::*;
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error_handling::types::ConfigError;

/// Command-line surface of the `labctl` binary.
#[derive(Parser, Debug)]
#[command(name = "labctl")]
#[command(version)]
#[command(about = "Lifecycle orchestrator for container based network labs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Destroy a lab defined by a topology file, or every discovered lab
    #[command(alias = "des")]
    Destroy(DestroyArgs),
}

/// Flags of the `destroy` command.
///
/// Optional flags left unset fall back to the `--config` defaults file, then to
/// the built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct DestroyArgs {
    /// Path to the topology definition file
    #[arg(short = 't', long = "topo")]
    pub topo: Option<PathBuf>,

    /// Path to a YAML file with variables for the topology template
    #[arg(long = "vars")]
    pub vars: Option<PathBuf>,

    /// Destroy all containerlab labs
    #[arg(short = 'a', long, action = clap::ArgAction::SetTrue)]
    pub all: bool,

    /// Delete lab directory. Cannot be used with node-filter
    #[arg(short = 'c', long, action = clap::ArgAction::SetTrue)]
    pub cleanup: bool,

    /// Attempt to stop containers before removing
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub graceful: bool,

    /// Limit the maximum number of workers deleting nodes
    #[arg(long = "max-workers")]
    pub max_workers: Option<usize>,

    /// Do not remove the management network
    #[arg(long = "keep-mgmt-net", action = clap::ArgAction::SetTrue)]
    pub keep_mgmt_net: bool,

    /// Comma separated list of nodes to include
    #[arg(long = "node-filter", value_delimiter = ',')]
    pub node_filter: Vec<String>,

    /// Timeout for runtime operations, e.g. `90s`, `2m` or plain seconds
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Time a graceful stop may take before the container is removed anyway
    #[arg(long = "stop-timeout", value_parser = parse_duration)]
    pub stop_timeout: Option<Duration>,

    /// Container runtime backend
    #[arg(short = 'r', long, env = "CLAB_RUNTIME")]
    pub runtime: Option<String>,

    /// Enable debug output
    #[arg(short = 'd', long, action = clap::ArgAction::SetTrue)]
    pub debug: bool,

    /// TOML file with default values for the flags above
    #[arg(long = "config", env = "LABCTL_CONFIG")]
    pub config: Option<PathBuf>,
}

impl DestroyArgs {
    /// Merges the flags with the optional defaults file into the options of this invocation.
    pub fn into_options(self) -> Result<DestroyOptions, ConfigError> {
        let defaults = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => FileDefaults::default(),
        };

        let options = DestroyOptions {
            all: self.all,
            cleanup: self.cleanup,
            graceful: self.graceful || defaults.graceful.unwrap_or(false),
            max_workers: self.max_workers.or(defaults.max_workers).unwrap_or(0),
            keep_mgmt_net: self.keep_mgmt_net || defaults.keep_mgmt_net.unwrap_or(false),
            node_filter: self
                .node_filter
                .into_iter()
                .map(|n| n.trim().to_string())
                .collect(),
            topology: self.topo,
            vars_file: self.vars,
            timeout: self
                .timeout
                .or(defaults.timeout_secs.map(Duration::from_secs))
                .unwrap_or(DEFAULT_TIMEOUT),
            stop_timeout: self
                .stop_timeout
                .or(defaults.stop_timeout_secs.map(Duration::from_secs))
                .unwrap_or(DEFAULT_STOP_TIMEOUT),
            runtime: self
                .runtime
                .or(defaults.runtime)
                .unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
            debug: self.debug,
        };

        options.validate()?;
        Ok(options)
    }
}

pub struct Config;

impl Config {
    /// Reads the TOML defaults file.
    pub fn from_file(path: &Path) -> Result<FileDefaults, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<FileDefaults, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))
    }
}

/// Parses `90`, `90s`, `500ms`, `2m` or `1h` into a [`Duration`].
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let re = Regex::new(r"^\s*(\d+)\s*(ms|s|m|h)?\s*$").map_err(|e| e.to_string())?;
    let caps = re
        .captures(raw)
        .ok_or_else(|| format!("invalid duration: {}", raw))?;
    let value: u64 = caps[1]
        .parse()
        .map_err(|e| format!("invalid duration {}: {}", raw, e))?;
    let duration = match caps.get(2).map(|m| m.as_str()) {
        Some("ms") => Duration::from_millis(value),
        Some("m") => Duration::from_secs(value * 60),
        Some("h") => Duration::from_secs(value * 3600),
        _ => Duration::from_secs(value),
    };
    Ok(duration)
}

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::configuration::types::RuntimeConfig;
use crate::container_management::runtime::{ContainerRuntime, OpContext};
use crate::container_management::types::{ContainerRecord, FilterOperator, GenericFilter};
use crate::error_handling::types::RuntimeError;
use crate::topology::types::{ManagementNetwork, Node};

const BRIDGE_NAME_OPTION: &str = "com.docker.network.bridge.name";

/// Backend that drives a docker compatible engine through its command line
/// client (`docker`, `podman`).
///
/// Each call spawns the client with `kill_on_drop`, so a cancelled or expired
/// [`OpContext`] also terminates the child process.
#[derive(Debug)]
pub struct CliRuntime {
    binary: String,
    config: RuntimeConfig,
}

#[derive(Debug, Deserialize)]
struct InspectedContainer {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Config", default)]
    config: InspectedConfig,
    #[serde(rename = "State", default)]
    state: InspectedState,
}

#[derive(Debug, Default, Deserialize)]
struct InspectedConfig {
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct InspectedState {
    #[serde(rename = "Status", default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct InspectedNetwork {
    #[serde(rename = "Id", alias = "id", default)]
    id: String,
    #[serde(rename = "Options", alias = "options", default)]
    options: Option<HashMap<String, String>>,
    /// podman reports the bridge directly
    #[serde(default)]
    network_interface: Option<String>,
}

impl CliRuntime {
    /// Creates the backend, failing when the client binary is not installed.
    pub fn new(binary: &str, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        if !Self::is_runtime_available(binary) {
            return Err(RuntimeError::RuntimeNotAvailable(binary.to_string()));
        }
        info!("Using {} container runtime", binary);
        Ok(Self {
            binary: binary.to_string(),
            config,
        })
    }

    fn is_runtime_available(binary: &str) -> bool {
        let available = std::process::Command::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        debug!("{} availability check: {}", binary, available);
        available
    }

    /// Runs the client and returns its stdout.
    async fn exec(&self, ctx: &OpContext, args: &[String]) -> Result<String, RuntimeError> {
        let description = format!("{} {}", self.binary, args.join(" "));
        debug!("Executing: {}", description);

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let ctx = ctx.with_timeout(self.config.timeout);
        let output = ctx
            .run(&description, async { cmd.output().await.map_err(RuntimeError::from) })
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if self.config.debug && !stderr.is_empty() {
            debug!("[{}][stderr] {}", self.binary, stderr);
        }

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        if is_not_found(&stderr) {
            return Err(RuntimeError::NotFound(stderr));
        }
        Err(RuntimeError::CommandFailed(format!(
            "{}: {}",
            description, stderr
        )))
    }

    async fn inspect_network(
        &self,
        ctx: &OpContext,
        network: &str,
    ) -> Result<String, RuntimeError> {
        let out = self
            .exec(ctx, &strings(&["network", "inspect", network]))
            .await?;
        let inspected: Vec<InspectedNetwork> =
            serde_json::from_str(&out).map_err(|e| RuntimeError::ParseError(e.to_string()))?;
        let net = inspected
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::NotFound(format!("network {}", network)))?;
        Ok(bridge_name(&net))
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    fn name(&self) -> &str {
        &self.binary
    }

    fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    async fn list_containers(
        &self,
        ctx: &OpContext,
        filters: &[GenericFilter],
    ) -> Result<Vec<ContainerRecord>, RuntimeError> {
        let mut args = strings(&["ps", "-a", "-q", "--no-trunc"]);
        for filter in filters {
            match (filter.operator, &filter.match_value) {
                (FilterOperator::Exists, _) => {
                    args.push("--filter".to_string());
                    args.push(format!("label={}", filter.field));
                }
                (FilterOperator::Equals, Some(v)) => {
                    args.push("--filter".to_string());
                    args.push(format!("label={}={}", filter.field, v));
                }
                _ => {}
            }
        }

        let out = self.exec(ctx, &args).await?;
        let ids: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            debug!("No containers matched filters {:?}", filters);
            return Ok(Vec::new());
        }

        let mut inspect_args = strings(&["inspect"]);
        inspect_args.extend(ids);
        let out = self.exec(ctx, &inspect_args).await?;
        let inspected: Vec<InspectedContainer> =
            serde_json::from_str(&out).map_err(|e| RuntimeError::ParseError(e.to_string()))?;

        let records: Vec<ContainerRecord> = inspected
            .into_iter()
            .map(ContainerRecord::from)
            .filter(|r| r.matches_all(filters))
            .collect();
        debug!("Listed {} containers", records.len());
        Ok(records)
    }

    async fn create_network(
        &self,
        ctx: &OpContext,
        mgmt: &ManagementNetwork,
    ) -> Result<String, RuntimeError> {
        match self.inspect_network(ctx, &mgmt.network).await {
            Ok(bridge) => {
                debug!(
                    "Management network {} already exists, bridge {}",
                    mgmt.network, bridge
                );
                return Ok(bridge);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        info!("Creating management network {}", mgmt.network);
        let mut args = strings(&["network", "create", "--driver", "bridge"]);
        if let Some(bridge) = &mgmt.bridge {
            args.push("--opt".to_string());
            args.push(format!("{}={}", BRIDGE_NAME_OPTION, bridge));
        }
        if let Some(subnet) = &mgmt.ipv4_subnet {
            args.push("--subnet".to_string());
            args.push(subnet.clone());
        }
        args.push("--label".to_string());
        args.push("containerlab".to_string());
        args.push(mgmt.network.clone());
        self.exec(ctx, &args).await?;

        self.inspect_network(ctx, &mgmt.network).await
    }

    async fn stop_node(
        &self,
        ctx: &OpContext,
        node: &Node,
        timeout: Duration,
    ) -> Result<(), RuntimeError> {
        let args = vec![
            "stop".to_string(),
            "-t".to_string(),
            timeout.as_secs().to_string(),
            node.runtime_handle().to_string(),
        ];
        self.exec(ctx, &args).await.map(|_| ())
    }

    async fn remove_node(&self, ctx: &OpContext, node: &Node) -> Result<(), RuntimeError> {
        let args = vec![
            "rm".to_string(),
            "-f".to_string(),
            "-v".to_string(),
            node.runtime_handle().to_string(),
        ];
        self.exec(ctx, &args).await.map(|_| ())
    }

    async fn remove_network(
        &self,
        ctx: &OpContext,
        mgmt: &ManagementNetwork,
    ) -> Result<(), RuntimeError> {
        if mgmt.keep {
            debug!("Keeping management network {}", mgmt.network);
            return Ok(());
        }
        match self
            .exec(ctx, &strings(&["network", "rm", mgmt.network.as_str()]))
            .await
        {
            Err(RuntimeError::CommandFailed(msg)) if is_in_use(&msg) => {
                Err(RuntimeError::InUse(mgmt.network.clone()))
            }
            res => res.map(|_| ()),
        }
    }
}

impl From<InspectedContainer> for ContainerRecord {
    fn from(c: InspectedContainer) -> Self {
        ContainerRecord {
            id: c.id,
            names: vec![c.name.trim_start_matches('/').to_string()],
            image: c.config.image,
            state: c.state.status,
            labels: c.config.labels.unwrap_or_default(),
        }
    }
}

fn bridge_name(net: &InspectedNetwork) -> String {
    if let Some(name) = net
        .options
        .as_ref()
        .and_then(|o| o.get(BRIDGE_NAME_OPTION))
        .filter(|n| !n.is_empty())
    {
        return name.clone();
    }
    if let Some(name) = net.network_interface.as_ref().filter(|n| !n.is_empty()) {
        return name.clone();
    }
    let short: String = net.id.chars().take(12).collect();
    format!("br-{}", short)
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container")
        || lower.contains("no such network")
        || lower.contains("no such object")
        || lower.contains("not found")
}

/// docker reports attached containers as active endpoints, podman as a
/// network being used.
fn is_in_use(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("active endpoints") || lower.contains("network is being used")
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

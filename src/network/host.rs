//! Host namespace side of link and management network cleanup.

use async_trait::async_trait;
use log::{debug, info};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::configuration::types::DEFAULT_TIMEOUT;
use crate::container_management::runtime::OpContext;
use crate::error_handling::types::RuntimeError;

const FORWARD_CHAIN: &str = "DOCKER-USER";
const RULE_COMMENT: &str = "set by containerlab";

/// Host level network resources left behind by a lab.
///
/// Both operations treat an already missing object as success.
#[async_trait]
pub trait HostNetwork: Send + Sync {
    /// Deletes a link living in the host namespace.
    async fn delete_link(&self, ctx: &OpContext, name: &str) -> Result<(), RuntimeError>;

    /// Removes the forwarding rules that let traffic in and out of `bridge`.
    async fn remove_forwarding_rules(&self, ctx: &OpContext, bridge: &str)
        -> Result<(), RuntimeError>;
}

/// [`HostNetwork`] backed by `ip` and `iptables`.
#[derive(Debug, Clone)]
pub struct IpHostNetwork {
    timeout: Duration,
}

impl Default for IpHostNetwork {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl IpHostNetwork {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs `program` and returns its trimmed stderr on failure.
    async fn exec(&self, ctx: &OpContext, program: &str, args: &[&str]) -> Result<(), RuntimeError> {
        let description = format!("{} {}", program, args.join(" "));
        debug!("Executing: {}", description);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let ctx = ctx.with_timeout(self.timeout);
        let output = ctx
            .run(&description, async { cmd.output().await.map_err(RuntimeError::from) })
            .await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_missing(&stderr) {
            return Err(RuntimeError::NotFound(stderr));
        }
        Err(RuntimeError::CommandFailed(format!("{}: {}", description, stderr)))
    }
}

fn is_missing(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("cannot find device")
        || lower.contains("does a matching rule exist")
        || lower.contains("no chain/target/match")
}

fn ignore_missing(res: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
    match res {
        Err(e) if e.is_not_found() => {
            debug!("Already gone: {}", e);
            Ok(())
        }
        other => other,
    }
}

#[async_trait]
impl HostNetwork for IpHostNetwork {
    async fn delete_link(&self, ctx: &OpContext, name: &str) -> Result<(), RuntimeError> {
        ignore_missing(self.exec(ctx, "ip", &["link", "del", name]).await)?;
        debug!("Deleted host link {}", name);
        Ok(())
    }

    async fn remove_forwarding_rules(
        &self,
        ctx: &OpContext,
        bridge: &str,
    ) -> Result<(), RuntimeError> {
        for direction in ["-i", "-o"] {
            let args = [
                "-D",
                FORWARD_CHAIN,
                direction,
                bridge,
                "-m",
                "comment",
                "--comment",
                RULE_COMMENT,
                "-j",
                "ACCEPT",
            ];
            ignore_missing(self.exec(ctx, "iptables", &args).await)?;
        }
        info!("Removed forwarding rules for bridge {}", bridge);
        Ok(())
    }
}

#[cfg(test)]
pub mod recording {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum HostEvent {
        DeleteLink(String),
        RemoveRules(String),
    }

    /// Records host operations instead of performing them.
    #[derive(Debug, Default)]
    pub struct RecordingHostNetwork {
        events: Mutex<Vec<HostEvent>>,
        failing_links: HashSet<String>,
    }

    impl RecordingHostNetwork {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_link(mut self, name: &str) -> Self {
            self.failing_links.insert(name.to_string());
            self
        }

        pub fn events(&self) -> Vec<HostEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HostNetwork for RecordingHostNetwork {
        async fn delete_link(&self, _ctx: &OpContext, name: &str) -> Result<(), RuntimeError> {
            self.events
                .lock()
                .unwrap()
                .push(HostEvent::DeleteLink(name.to_string()));
            if self.failing_links.contains(name) {
                return Err(RuntimeError::CommandFailed(format!("cannot delete {}", name)));
            }
            Ok(())
        }

        async fn remove_forwarding_rules(
            &self,
            _ctx: &OpContext,
            bridge: &str,
        ) -> Result<(), RuntimeError> {
            self.events
                .lock()
                .unwrap()
                .push(HostEvent::RemoveRules(bridge.to_string()));
            Ok(())
        }
    }
}

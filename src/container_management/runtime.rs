//! Capability interface every container engine backend implements, and the
//! cancellation/deadline context threaded through each call.

use async_trait::async_trait;
use log::trace;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::configuration::types::RuntimeConfig;
use crate::container_management::types::{ContainerRecord, GenericFilter};
use crate::error_handling::types::RuntimeError;
use crate::topology::types::{ManagementNetwork, Node};

/// Cancellation token plus an optional deadline.
///
/// Cloning shares the token. [`OpContext::with_timeout`] derives a child whose
/// deadline is the earlier of the parent's and `now + timeout`; cancelling the
/// parent cancels every child.
#[derive(Debug, Clone)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Drives `fut` until it completes, the context is cancelled, or the
    /// deadline passes. `what` names the operation in the timeout error.
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T, RuntimeError>
    where
        F: Future<Output = Result<T, RuntimeError>>,
    {
        if self.token.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                trace!("{} cancelled", what);
                Err(RuntimeError::Cancelled)
            }
            _ = expired => {
                trace!("{} hit its deadline", what);
                Err(RuntimeError::Timeout(what.to_string()))
            }
            res = fut => res,
        }
    }
}

/// Uniform interface over container engines.
///
/// Every call receives the caller's [`OpContext`] and must return promptly
/// with [`RuntimeError::Cancelled`] or [`RuntimeError::Timeout`] once it
/// fires. Objects that are already gone are reported as
/// [`RuntimeError::NotFound`] so callers can treat them as removed.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Backend name as used in the registry.
    fn name(&self) -> &str;

    fn config(&self) -> &RuntimeConfig;

    /// Lists containers matching all `filters`.
    async fn list_containers(
        &self,
        ctx: &OpContext,
        filters: &[GenericFilter],
    ) -> Result<Vec<ContainerRecord>, RuntimeError>;

    /// Creates the management network if it is absent and returns the name of
    /// the host bridge backing it.
    async fn create_network(
        &self,
        ctx: &OpContext,
        mgmt: &ManagementNetwork,
    ) -> Result<String, RuntimeError>;

    /// Asks the node's container to stop, waiting at most `timeout`.
    async fn stop_node(
        &self,
        ctx: &OpContext,
        node: &Node,
        timeout: Duration,
    ) -> Result<(), RuntimeError>;

    /// Force-removes the node's container.
    async fn remove_node(&self, ctx: &OpContext, node: &Node) -> Result<(), RuntimeError>;

    /// Removes the management network. Networks flagged `keep` are left alone.
    async fn remove_network(
        &self,
        ctx: &OpContext,
        mgmt: &ManagementNetwork,
    ) -> Result<(), RuntimeError>;
}

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error_handling::types::{RuntimeError, TeardownError};

/// Why a node's teardown did not go cleanly.
#[derive(Debug)]
pub enum FailureCause {
    /// Graceful stop ran out of time; removal still went ahead.
    StopTimeout,
    StopFailed(RuntimeError),
    RemoveFailed(RuntimeError),
    HostLinkFailed {
        interface: String,
        error: RuntimeError,
    },
    /// Cancelled before a worker picked the node up.
    NotDispatched,
    TaskPanicked,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::StopTimeout => write!(f, "stop timeout"),
            FailureCause::StopFailed(e) => write!(f, "stop failed: {}", e),
            FailureCause::RemoveFailed(e) => write!(f, "remove failed: {}", e),
            FailureCause::HostLinkFailed { interface, error } => {
                write!(f, "failed to delete host link {}: {}", interface, error)
            }
            FailureCause::NotDispatched => write!(f, "not dispatched before cancellation"),
            FailureCause::TaskPanicked => write!(f, "teardown task panicked"),
        }
    }
}

/// What happened to one node.
///
/// `warnings` never fail the node; anything in `failures` does.
#[derive(Debug)]
pub struct NodeOutcome {
    pub node: String,
    pub warnings: Vec<FailureCause>,
    pub failures: Vec<FailureCause>,
}

impl NodeOutcome {
    pub fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            warnings: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn failed(node: &str, cause: FailureCause) -> Self {
        let mut outcome = Self::new(node);
        outcome.failures.push(cause);
        outcome
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct NodeFailure {
    pub node: String,
    pub cause: FailureCause,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}: {}", self.node, self.cause)
    }
}

/// Result of tearing down one lab, successful or not.
#[derive(Debug)]
pub struct TeardownOutcome {
    pub lab: String,
    /// Sorted by node name.
    pub nodes: Vec<NodeOutcome>,
    pub network_removed: bool,
    pub network_error: Option<RuntimeError>,
    pub finished_at: DateTime<Utc>,
}

impl TeardownOutcome {
    pub fn node(&self, name: &str) -> Option<&NodeOutcome> {
        self.nodes.iter().find(|n| n.node == name)
    }

    pub fn is_success(&self) -> bool {
        self.network_error.is_none() && self.nodes.iter().all(NodeOutcome::is_success)
    }

    /// Folds every node and network failure into a single [`TeardownError`].
    pub fn into_result(self) -> Result<TeardownOutcome, TeardownError> {
        if self.is_success() {
            return Ok(self);
        }
        let node_failures = self
            .nodes
            .into_iter()
            .flat_map(|outcome| {
                let node = outcome.node;
                outcome.failures.into_iter().map(move |cause| NodeFailure {
                    node: node.clone(),
                    cause,
                })
            })
            .collect();
        Err(TeardownError {
            lab: self.lab,
            node_failures,
            network_error: self.network_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(nodes: Vec<NodeOutcome>, network_error: Option<RuntimeError>) -> TeardownOutcome {
        TeardownOutcome {
            lab: "lab1".to_string(),
            nodes,
            network_removed: network_error.is_none(),
            network_error,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn warnings_do_not_fail_the_lab() {
        let mut n1 = NodeOutcome::new("n1");
        n1.warnings.push(FailureCause::StopTimeout);
        assert!(outcome(vec![n1], None).into_result().is_ok());
    }

    #[test]
    fn failures_are_flattened_per_node() {
        let mut n1 = NodeOutcome::failed(
            "n1",
            FailureCause::RemoveFailed(RuntimeError::CommandFailed("boom".to_string())),
        );
        n1.failures.push(FailureCause::HostLinkFailed {
            interface: "n1-eth1".to_string(),
            error: RuntimeError::Cancelled,
        });
        let n2 = NodeOutcome::new("n2");

        let err = outcome(vec![n1, n2], None).into_result().unwrap_err();
        assert_eq!(err.lab, "lab1");
        assert_eq!(err.node_failures.len(), 2);
        assert!(err.node_failures.iter().all(|f| f.node == "n1"));
        assert!(err.to_string().contains("node n1: remove failed"));
    }

    #[test]
    fn network_error_alone_fails_the_lab() {
        let err = outcome(Vec::new(), Some(RuntimeError::Timeout("network rm".to_string())))
            .into_result()
            .unwrap_err();
        assert!(err.node_failures.is_empty());
        assert!(err.to_string().contains("management network"));
    }
}

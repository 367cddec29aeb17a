use crate::state::FINISH;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A position in the graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Node {
    /// Intent classification (optional entry)
    Intent,
    /// Routing decision
    Supervisor,
    /// A registered worker
    Worker(String),
    /// Terminal
    Finish,
}

impl Node {
    /// Worker node
    #[must_use]
    pub fn worker(name: impl Into<String>) -> Self {
        Self::Worker(name.into())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intent => f.write_str("intent"),
            Self::Supervisor => f.write_str("supervisor"),
            Self::Worker(name) => f.write_str(name),
            Self::Finish => f.write_str(FINISH),
        }
    }
}

/// Where a worker hands control after it replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerEdge {
    /// End the turn after one worker reply
    #[default]
    Finish,
    /// Return to the supervisor for another decision
    Supervisor,
}

impl WorkerEdge {
    pub(crate) fn target(self) -> Node {
        match self {
            Self::Finish => Node::Finish,
            Self::Supervisor => Node::Supervisor,
        }
    }
}

/// Execution limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Default worker edge
    pub worker_edge: WorkerEdge,
    /// Transitions allowed per turn
    pub max_steps: usize,
    /// Bound on each worker invocation
    pub call_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            worker_edge: WorkerEdge::Finish,
            max_steps: 25,
            call_timeout: Duration::from_secs(30),
        }
    }
}

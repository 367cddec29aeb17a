use serde::Serialize;
use uuid::Uuid;

/// Events emitted while a graph turn runs.
///
/// `run_id` identifies one `run`/`resume` call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    /// A call to `run` or `resume` began executing transitions
    RunStarted {
        /// Run identifier
        run_id: Uuid,
        /// Thread
        thread_id: String,
        /// Node the run starts at
        node: String,
    },
    /// A node is about to execute
    NodeStarted {
        /// Run identifier
        run_id: Uuid,
        /// Thread
        thread_id: String,
        /// Node name
        node: String,
        /// Transition number within the turn
        step: usize,
    },
    /// A node finished and its checkpoint was saved
    NodeCompleted {
        /// Run identifier
        run_id: Uuid,
        /// Thread
        thread_id: String,
        /// Node name
        node: String,
        /// Transition number within the turn
        step: usize,
        /// Node that runs next
        next: String,
        /// Message appended by the node, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    /// The turn reached FINISH
    RunCompleted {
        /// Run identifier
        run_id: Uuid,
        /// Thread
        thread_id: String,
        /// Transitions taken in this turn
        steps: usize,
    },
    /// A transition failed; the previous checkpoint stands
    RunFailed {
        /// Run identifier
        run_id: Uuid,
        /// Thread
        thread_id: String,
        /// Rendered error
        error: String,
    },
    /// Cancelled between transitions
    RunCancelled {
        /// Run identifier
        run_id: Uuid,
        /// Thread
        thread_id: String,
    },
}

impl GraphEvent {
    /// Run identifier
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::NodeStarted { run_id, .. }
            | Self::NodeCompleted { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::RunFailed { run_id, .. }
            | Self::RunCancelled { run_id, .. } => *run_id,
        }
    }

    /// Thread the event belongs to
    #[must_use]
    pub fn thread_id(&self) -> &str {
        match self {
            Self::RunStarted { thread_id, .. }
            | Self::NodeStarted { thread_id, .. }
            | Self::NodeCompleted { thread_id, .. }
            | Self::RunCompleted { thread_id, .. }
            | Self::RunFailed { thread_id, .. }
            | Self::RunCancelled { thread_id, .. } => thread_id,
        }
    }

    /// True for events that end a run
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. } | Self::RunFailed { .. } | Self::RunCancelled { .. }
        )
    }
}

//! Error types for sage-core
//!
//! This module provides error types and user-friendly error formatting.

use thiserror::Error;


/// Boxed error carried by [`Error::AgentInvocation`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A worker's underlying call failed
    #[error("worker '{worker}' failed: {source}")]
    AgentInvocation {
        /// Registered worker name
        worker: String,
        /// Underlying cause
        #[source]
        source: BoxError,
    },

    /// Supervisor answered outside the allowed enumeration
    #[error("supervisor returned {raw:?}, expected one of {allowed:?}")]
    RoutingDecision {
        /// Raw model output
        raw: String,
        /// Allowed options
        allowed: Vec<String>,
    },

    /// Intent classifier output could not be parsed
    #[error("cannot parse intent codes from {raw:?}: bad token {token:?}")]
    ClassificationParse {
        /// Raw model output
        raw: String,
        /// First offending token
        token: String,
    },

    /// A blocking call exceeded its bound
    #[error("{component} timed out after {timeout_ms}ms")]
    UpstreamTimeout {
        /// Component that was waiting
        component: String,
        /// Configured bound
        timeout_ms: u64,
    },

    /// Remote graph lookup failed for one entity
    #[error("graph lookup failed for '{entity}': {message}")]
    GraphLookup {
        /// Seed entity id
        entity: String,
        /// Underlying cause
        message: String,
    },

    /// Retrieval chain failed
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Checkpoint store failure
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Intent log failure
    #[error("intent log error: {0}")]
    IntentLog(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Graph failed validation at compile time
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// No checkpoint exists for the thread
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    /// The turn did not reach FINISH within the step bound
    #[error("thread '{thread_id}' exceeded {max_steps} steps without finishing")]
    StepLimitExceeded {
        /// Thread id
        thread_id: String,
        /// Configured bound
        max_steps: usize,
    },

    /// Cancelled between transitions
    #[error("thread '{thread_id}' cancelled")]
    Cancelled {
        /// Thread id
        thread_id: String,
    },

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] sage_llm::Error),

    /// A transition aborted; the last checkpoint is unchanged
    #[error("thread '{thread_id}' failed at {node}: {source}")]
    Transition {
        /// Thread id
        thread_id: String,
        /// Node that was executing
        node: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether repeating the same call may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamTimeout { .. } | Self::RoutingDecision { .. } => true,
            Self::Llm(e) => e.is_transient(),
            Self::Transition { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The innermost error, looking through [`Error::Transition`]
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Self::Transition { source, .. } => source.root(),
            other => other,
        }
    }

    /// Wrap a cause as a failure of `worker`
    pub fn agent(worker: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::AgentInvocation {
            worker: worker.into(),
            source: source.into(),
        }
    }
}

impl From<sage_kg::Error> for Error {
    fn from(e: sage_kg::Error) -> Self {
        match e {
            sage_kg::Error::Lookup { entity, message } => Self::GraphLookup { entity, message },
            sage_kg::Error::Timeout { entity, timeout_ms } => Self::UpstreamTimeout {
                component: format!("knowledge graph lookup for '{}'", entity),
                timeout_ms,
            },
            other => Self::GraphLookup {
                entity: String::new(),
                message: other.to_string(),
            },
        }
    }
}

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages, suggestions for fixing,
/// and links to documentation.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;

    /// Get a documentation URL for more information
    fn docs_url(&self) -> Option<&str>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::AgentInvocation { worker, source } => {
                format!("🤖 The {} worker could not answer: {}", worker, source)
            }
            Error::RoutingDecision { raw, .. } => {
                format!("🧭 The supervisor gave an unusable routing answer: {:?}", raw)
            }
            Error::ClassificationParse { raw, .. } => {
                format!("🏷️ Intent classification returned {:?}", raw)
            }
            Error::UpstreamTimeout {
                component,
                timeout_ms,
            } => format!("⏳ {} did not respond within {}ms.", component, timeout_ms),
            Error::GraphLookup { entity, message } => {
                format!("🕸️ Knowledge graph lookup for '{}' failed: {}", entity, message)
            }
            Error::Retrieval(msg) => format!("📚 Retrieval failed: {}", msg),
            Error::Checkpoint(msg) => format!("💾 Checkpoint store error: {}", msg),
            Error::IntentLog(msg) => format!("📝 Intent log error: {}", msg),
            Error::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
            Error::InvalidGraph(msg) => format!("🔀 Invalid graph: {}", msg),
            Error::ThreadNotFound(thread) => {
                format!("🔍 No conversation found for thread '{}'.", thread)
            }
            Error::StepLimitExceeded {
                thread_id,
                max_steps,
            } => format!(
                "🔁 Thread '{}' did not finish within {} steps.",
                thread_id, max_steps
            ),
            Error::Cancelled { thread_id } => format!("✋ Thread '{}' was cancelled.", thread_id),
            Error::Llm(e) => format!("🤖 LLM error: {}", e),
            Error::Transition {
                thread_id,
                node,
                source,
            } => format!(
                "❌ Thread '{}' stopped at {}.\n{}",
                thread_id,
                node,
                source.user_message()
            ),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Transition { source, .. } => source.suggestion(),
            Error::UpstreamTimeout { .. } => Some(
                "💡 Raise graph.call_timeout_secs or check that the model server is up."
                    .to_string(),
            ),
            Error::RoutingDecision { .. } => Some(
                "💡 Use a server with guided decoding (vLLM guided_json) or raise supervisor.max_attempts."
                    .to_string(),
            ),
            Error::Llm(_) | Error::AgentInvocation { .. } => {
                Some("💡 Check llm.base_url and llm.model in your configuration.".to_string())
            }
            Error::ThreadNotFound(_) => {
                Some("💡 Start the conversation with `sage chat` first.".to_string())
            }
            Error::StepLimitExceeded { .. } => Some(
                "💡 The supervisor keeps delegating; raise graph.max_steps or disable loop-back."
                    .to_string(),
            ),
            Error::Configuration(_) | Error::InvalidGraph(_) => {
                Some("💡 Check config/default.toml or SAGE_* environment variables.".to_string())
            }
            _ => None,
        }
    }

    fn docs_url(&self) -> Option<&str> {
        match self {
            Error::Configuration(_) | Error::InvalidGraph(_) => {
                Some("https://github.com/sage-research/sage#configuration")
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = String::new();

    output.push_str(&error.user_message());
    output.push_str("\n\n");

    if let Some(suggestion) = error.suggestion() {
        output.push_str(&suggestion);
        output.push_str("\n\n");
    }

    if let Some(url) = error.docs_url() {
        output.push_str(&format!("📚 More info: {}", url));
        output.push('\n');
    }

    output
}

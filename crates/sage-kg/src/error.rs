//! Error types for the knowledge-graph agent.

/// Errors that can occur in knowledge-graph operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Redis / RedisGraph transport or command error
    #[error("graph store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Lookup for a single entity failed
    #[error("lookup failed for '{entity}': {message}")]
    Lookup {
        /// Seed entity id
        entity: String,
        /// Underlying cause
        message: String,
    },

    /// Lookup for a single entity exceeded its time bound
    #[error("lookup for '{entity}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Seed entity id
        entity: String,
        /// Configured bound
        timeout_ms: u64,
    },

    /// Query result did not have the expected shape
    #[error("malformed graph response: {0}")]
    MalformedResponse(String),

    /// Invalid query pattern parameters
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Serialization / deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while loading fixtures
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;

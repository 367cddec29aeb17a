//! GraphStore - the remote graph-store boundary.
//!
//! The core only ever issues the fixed [`TwoHopPattern`]; stores return rows in
//! the order the backend produced them.

use crate::error::Result;
use crate::pattern::TwoHopPattern;
use crate::types::GraphRow;

mod memory;
mod redis_graph;

#[cfg(test)]
mod tests;

pub use memory::{InMemoryGraphStore, NodeSpec};
pub use redis_graph::RedisGraphStore;

/// A queryable graph store.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Run the two-hop pattern and return at most `pattern.limit` rows.
    async fn query(&self, pattern: &TwoHopPattern) -> Result<Vec<GraphRow>>;
}

//! In-memory property graph.
//!
//! Small enough for fixtures and the local seed file, but it walks the same
//! two-hop pattern a remote store does.

use super::GraphStore;
use crate::error::Result;
use crate::pattern::TwoHopPattern;
use crate::types::GraphRow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A node with an id, a display name and labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique id (e.g. `MONDO:0005148`)
    pub id: String,
    /// Display name, returned by queries
    pub name: String,
    /// Node labels
    #[serde(default)]
    pub labels: Vec<String>,
}

impl NodeSpec {
    /// Create a node without labels
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            labels: Vec::new(),
        }
    }

    /// Add a label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct EdgeSpec {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    #[serde(default)]
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    edges: Vec<EdgeSpec>,
}

/// Directed graph held in memory
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    nodes: HashMap<String, NodeSpec>,
    adjacency: HashMap<String, Vec<String>>,
}

impl InMemoryGraphStore {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a node
    pub fn add_node(&mut self, node: NodeSpec) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Add a directed edge; endpoints need not exist yet
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.adjacency
            .entry(from.into())
            .or_default()
            .push(to.into());
    }

    /// Builder form of [`add_node`](Self::add_node)
    #[must_use]
    pub fn with_node(mut self, node: NodeSpec) -> Self {
        self.add_node(node);
        self
    }

    /// Builder form of [`add_edge`](Self::add_edge)
    #[must_use]
    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_edge(from, to);
        self
    }

    /// Parse `{"nodes": [...], "edges": [{"from": .., "to": ..}]}`
    ///
    /// # Errors
    /// Returns error on malformed JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let file: GraphFile = serde_json::from_str(json)?;
        let mut store = Self::new();
        for node in file.nodes {
            store.add_node(node);
        }
        for edge in file.edges {
            store.add_edge(edge.from, edge.to);
        }
        Ok(store)
    }

    /// Load a graph file from disk
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn successors<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a NodeSpec> + 'a {
        self.adjacency
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|to| self.nodes.get(to))
    }

    fn walk(&self, pattern: &TwoHopPattern) -> Vec<GraphRow> {
        let Some(seed) = self.nodes.get(&pattern.seed) else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        for intermediate in self.successors(&seed.id) {
            for terminal in self.successors(&intermediate.id) {
                if !terminal.labels.iter().any(|l| l == &pattern.terminal_label) {
                    continue;
                }
                rows.push(GraphRow::new(&seed.id, &intermediate.name, &terminal.name));
                if rows.len() == pattern.limit {
                    return rows;
                }
            }
        }
        rows
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, pattern: &TwoHopPattern) -> Result<Vec<GraphRow>> {
        // Same validation the remote store applies
        pattern.to_cypher()?;
        Ok(self.walk(pattern))
    }
}

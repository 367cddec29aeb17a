//! RedisGraph-backed store (also works against FalkorDB).
//!
//! # Security Features
//!
//! - The seed id is sent as a `CYPHER` parameter, never interpolated
//! - Credentials belong in the Redis URL (`redis://:password@host:6379`);
//!   they are never logged

use super::GraphStore;
use crate::error::{Error, Result};
use crate::pattern::TwoHopPattern;
use crate::types::GraphRow;
use async_trait::async_trait;
use redis::Value;
use tracing::debug;

/// RedisGraph store for one named graph
pub struct RedisGraphStore {
    client: redis::Client,
    graph_name: String,
}

impl RedisGraphStore {
    /// Create a store for `graph_name` on the server at `redis_url`
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn new(redis_url: &str, graph_name: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            graph_name: graph_name.into(),
        })
    }

    /// Name of the graph queried
    #[must_use]
    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl GraphStore for RedisGraphStore {
    fn name(&self) -> &str {
        "redisgraph"
    }

    async fn query(&self, pattern: &TwoHopPattern) -> Result<Vec<GraphRow>> {
        let cypher = pattern.to_cypher()?;
        let mut conn = self.get_connection().await?;

        let reply: Value = redis::cmd("GRAPH.QUERY")
            .arg(&self.graph_name)
            .arg(&cypher)
            .query_async(&mut conn)
            .await?;

        let rows = parse_result_set(reply)?;
        debug!(
            graph = %self.graph_name,
            seed = %pattern.seed,
            rows = rows.len(),
            "Two-hop query completed"
        );
        Ok(rows)
    }
}

/// Parse a verbose `GRAPH.QUERY` reply: `[header, rows, statistics]`.
///
/// Write-only queries reply with statistics alone; that is an empty result.
pub(crate) fn parse_result_set(reply: Value) -> Result<Vec<GraphRow>> {
    let Value::Array(parts) = reply else {
        return Err(Error::MalformedResponse(
            "top-level reply is not an array".to_string(),
        ));
    };

    if parts.len() < 3 {
        return Ok(Vec::new());
    }

    let Value::Array(records) = &parts[1] else {
        return Err(Error::MalformedResponse(
            "result set is not an array".to_string(),
        ));
    };

    records
        .iter()
        .map(|record| match record {
            Value::Array(cells) => Ok(GraphRow {
                seed: cells.first().and_then(cell_to_string),
                concept: cells.get(1).and_then(cell_to_string),
                study: cells.get(2).and_then(cell_to_string),
            }),
            _ => Err(Error::MalformedResponse(
                "record is not an array".to_string(),
            )),
        })
        .collect()
}

fn cell_to_string(cell: &Value) -> Option<String> {
    match cell {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Double(d) => Some(d.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_verbose_reply() {
        let reply = Value::Array(vec![
            Value::Array(vec![bulk("a.id"), bulk("n1.name"), bulk("b.name")]),
            Value::Array(vec![
                Value::Array(vec![bulk("MONDO:1"), bulk("heart"), bulk("study-9")]),
                Value::Array(vec![bulk("MONDO:1"), Value::Nil, bulk("study-10")]),
            ]),
            Value::Array(vec![bulk("Query internal execution time: 0.2 milliseconds")]),
        ]);

        let rows = parse_result_set(reply).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], GraphRow::new("MONDO:1", "heart", "study-9"));
        assert_eq!(rows[1].concept, None);
        assert_eq!(rows[1].study.as_deref(), Some("study-10"));
    }

    #[test]
    fn test_parse_stats_only_reply() {
        let reply = Value::Array(vec![Value::Array(vec![bulk("Nodes created: 0")])]);
        assert!(parse_result_set(reply).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(matches!(
            parse_result_set(Value::Nil),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_invalid_url() {
        assert!(RedisGraphStore::new("not a url", "kg").is_err());
    }

    // RedisGraph tests require a running server with a loaded graph
    // Run with: cargo test -p sage-kg --features redis-tests
    #[cfg(feature = "redis-tests")]
    #[tokio::test]
    async fn test_live_query() {
        let store = RedisGraphStore::new("redis://127.0.0.1:6379", "sage_test").unwrap();
        let rows = store.query(&TwoHopPattern::new("MONDO:0005148")).await.unwrap();
        assert!(rows.len() <= 10);
    }
}

//! The fixed two-hop lookup pattern.
//!
//! `(seed {id})-[]->(intermediate)-[]->(terminal:<label>)`, returning
//! `seed.id, intermediate.name, terminal.name`, capped at `limit` rows.
//! No other query shape is ever issued.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default terminal node label
pub const DEFAULT_TERMINAL_LABEL: &str = "biolink.StudyVariable";

/// Default row cap
pub const DEFAULT_LIMIT: usize = 10;

/// Parameters of a two-hop lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoHopPattern {
    /// Seed entity id
    pub seed: String,
    /// Label the terminal node must carry
    pub terminal_label: String,
    /// Maximum rows returned
    pub limit: usize,
}

impl TwoHopPattern {
    /// Pattern for `seed` with default label and limit
    #[must_use]
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            terminal_label: DEFAULT_TERMINAL_LABEL.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Override the terminal label
    #[must_use]
    pub fn with_terminal_label(mut self, label: impl Into<String>) -> Self {
        self.terminal_label = label.into();
        self
    }

    /// Override the row cap
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Render as a parameterized RedisGraph query.
    ///
    /// The seed travels as a `CYPHER` parameter, never spliced into the
    /// pattern. The label is validated because labels cannot be parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] for an empty seed, a zero limit or a
    /// label containing a backtick.
    pub fn to_cypher(&self) -> Result<String> {
        if self.seed.is_empty() {
            return Err(Error::InvalidPattern("empty seed id".to_string()));
        }
        if self.limit == 0 {
            return Err(Error::InvalidPattern("limit must be positive".to_string()));
        }
        if self.terminal_label.is_empty() || self.terminal_label.contains('`') {
            return Err(Error::InvalidPattern(format!(
                "unusable terminal label '{}'",
                self.terminal_label
            )));
        }

        Ok(format!(
            "CYPHER seed={} MATCH (a {{id: $seed}})-[e1]->(n1)-[e2]->(b:`{}`) \
             RETURN a.id, n1.name, b.name LIMIT {}",
            quote_param(&self.seed),
            self.terminal_label,
            self.limit
        ))
    }
}

/// Quote a string as a Cypher parameter literal
fn quote_param(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

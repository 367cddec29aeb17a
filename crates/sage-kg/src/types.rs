//! Core data types for knowledge-graph lookups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the graph knows about one seed entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Names of intermediate nodes reached in one hop
    #[serde(default)]
    pub related_concepts: Vec<String>,
    /// Names of terminal (study) nodes reached in two hops
    #[serde(default)]
    pub related_studies: Vec<String>,
}

impl EntityRecord {
    /// Build a record from query rows, keeping first-seen order and
    /// dropping repeats.
    #[must_use]
    pub fn from_rows(rows: &[GraphRow]) -> Self {
        let mut record = Self::default();
        for row in rows {
            if let Some(concept) = &row.concept {
                push_unique(&mut record.related_concepts, concept);
            }
            if let Some(study) = &row.study {
                push_unique(&mut record.related_studies, study);
            }
        }
        record
    }

    /// True when the record carries no relations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.related_concepts.is_empty() && self.related_studies.is_empty()
    }
}

pub(crate) fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

/// Per-entity subgraph keyed by entity id.
pub type Subgraph = BTreeMap<String, EntityRecord>;

/// One row of a two-hop query: `(seed id, intermediate name, terminal name)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRow {
    /// Seed node id
    pub seed: Option<String>,
    /// Intermediate node name
    pub concept: Option<String>,
    /// Terminal node name
    pub study: Option<String>,
}

impl GraphRow {
    /// Convenience constructor for fully populated rows
    #[must_use]
    pub fn new(seed: &str, concept: &str, study: &str) -> Self {
        Self {
            seed: Some(seed.to_string()),
            concept: Some(concept.to_string()),
            study: Some(study.to_string()),
        }
    }
}

/// Summary derived from a subgraph. Lists are in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenInsights {
    /// Study identifiers reachable from any seed, deduplicated
    pub hidden_relationships: Vec<String>,
    /// Related concepts that are themselves among the queried entities
    pub important_entities: Vec<String>,
    /// Related concepts the query did not mention
    pub hidden_concepts: Vec<String>,
}

impl HiddenInsights {
    /// True when nothing was derived
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hidden_relationships.is_empty()
            && self.important_entities.is_empty()
            && self.hidden_concepts.is_empty()
    }
}

/// An entity whose remote lookup failed; it is absent from the subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupFailure {
    /// Seed entity id
    pub entity: String,
    /// Rendered cause
    pub error: String,
}

/// Result of a batch lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupOutcome {
    /// Records for every entity that was found
    pub subgraph: Subgraph,
    /// Derived summary
    pub insights: HiddenInsights,
    /// Entities skipped because the store failed for them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<LookupFailure>,
}

impl LookupOutcome {
    /// Render the outcome as plain-text prompt context.
    ///
    /// Returns `None` when there is nothing worth adding.
    #[must_use]
    pub fn render_summary(&self) -> Option<String> {
        if self.subgraph.is_empty() {
            return None;
        }

        let mut out = String::from("Knowledge graph context:\n");
        for (entity, record) in &self.subgraph {
            out.push_str(&format!(
                "- {}: related concepts [{}]; related studies [{}]\n",
                entity,
                record.related_concepts.join(", "),
                record.related_studies.join(", ")
            ));
        }

        let sections = [
            ("Hidden concepts", &self.insights.hidden_concepts),
            ("Important entities", &self.insights.important_entities),
            ("Hidden relationships", &self.insights.hidden_relationships),
        ];
        for (title, items) in sections {
            if !items.is_empty() {
                out.push_str(&format!("{}: {}\n", title, items.join(", ")));
            }
        }
        Some(out)
    }
}

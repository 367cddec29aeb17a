//! Sage KG - Knowledge-graph enrichment
//!
//! Expands seed entities into a subgraph of related concepts and studies and
//! derives "hidden insights": concepts and relationships reachable from the
//! seeds that the user did not ask about directly.
//!
//! # Architecture
//!
//! ```text
//! entity ids ──► KnowledgeGraphAgent
//!                   │
//!          CacheStore (hit) ──────────────┐
//!                   │ miss                │
//!          GraphStore::query(TwoHopPattern)
//!          (RedisGraph / in-memory)       │
//!                   │                     │
//!                   └──► Subgraph ◄───────┘
//!                           │
//!                   derive_insights
//!                           │
//!                    HiddenInsights
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod cache;
pub mod error;
pub mod extractor;
pub mod pattern;
pub mod store;
pub mod types;

pub use agent::{derive_insights, KnowledgeGraphAgent, KnowledgeGraphConfig};
pub use cache::{CacheStore, MemoryCache};
pub use error::{Error, Result};
pub use extractor::extract_entity_ids;
pub use pattern::TwoHopPattern;
pub use store::{GraphStore, InMemoryGraphStore, NodeSpec, RedisGraphStore};
pub use types::{EntityRecord, GraphRow, HiddenInsights, LookupFailure, LookupOutcome, Subgraph};

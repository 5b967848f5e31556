//! Wayang Graph - Graph database abstraction
//!
//! Provides abstraction over the property graph (Neo4j) that stores
//! extracted entities as labeled nodes and relations as typed edges.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wayang_core::{EntityRecord, RelationRecord, Result};

/// One `(source)-[relationship]->(target)` fact read from the graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRow {
    pub source: String,
    pub relationship: String,
    pub target: String,
}

impl GraphRow {
    pub fn new(
        source: impl Into<String>,
        relationship: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            relationship: relationship.into(),
            target: target.into(),
        }
    }
}

/// Trait for graph database operations
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert an entity node keyed by name
    async fn merge_entity(&self, entity: &EntityRecord) -> Result<()>;

    /// Upsert a typed edge between two existing nodes
    async fn merge_relation(&self, relation: &RelationRecord) -> Result<()>;

    /// Execute a read query returning `source`, `relationship`, `target` columns
    async fn run_read(&self, cypher: &str) -> Result<Vec<GraphRow>>;

    /// Round-trip a trivial query
    async fn verify_connectivity(&self) -> Result<()>;
}

pub mod import;
pub mod neo4j_store;

pub use import::{
    entity_merge_statement, relation_merge_statement, sanitize_relation_type, GraphImporter,
    ImportSummary,
};
pub use neo4j_store::Neo4jStore;

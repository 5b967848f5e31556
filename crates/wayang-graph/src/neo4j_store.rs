//! Neo4j implementation for graph storage
//!
//! Speaks Bolt through `neo4rs`. Entity and relation writes use the
//! statement builders from [`crate::import`].

use async_trait::async_trait;
use neo4rs::{query, Graph};
use wayang_core::{EntityRecord, GraphConfig, RelationRecord, Result, WayangError};

use crate::import::{entity_merge_statement, relation_merge_statement};
use crate::{GraphRow, GraphStore};

/// Neo4j graph store implementation
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Open a connection pool
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(|e| WayangError::Database(format!("Neo4j connection failed: {e}")))?;

        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn merge_entity(&self, entity: &EntityRecord) -> Result<()> {
        let q = query(&entity_merge_statement(entity.label))
            .param("name", entity.name.as_str())
            .param("stories", entity.stories.clone())
            .param("confidence", entity.confidence as f64);

        self.graph
            .run(q)
            .await
            .map_err(|e| WayangError::Database(format!("Failed to merge {}: {e}", entity.name)))
    }

    async fn merge_relation(&self, relation: &RelationRecord) -> Result<()> {
        let q = query(&relation_merge_statement(&relation.relation_type))
            .param("source", relation.source.as_str())
            .param("target", relation.target.as_str())
            .param("story", relation.story_source.as_str());

        self.graph.run(q).await.map_err(|e| {
            WayangError::Database(format!(
                "Failed to merge {} -> {}: {e}",
                relation.source, relation.target
            ))
        })
    }

    async fn run_read(&self, cypher: &str) -> Result<Vec<GraphRow>> {
        let mut stream = self
            .graph
            .execute(query(cypher))
            .await
            .map_err(|e| WayangError::Database(format!("Query failed: {e}")))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| WayangError::Database(format!("Failed to read row: {e}")))?
        {
            rows.push(GraphRow {
                source: row.get("source").unwrap_or_default(),
                relationship: row.get("relationship").unwrap_or_default(),
                target: row.get("target").unwrap_or_default(),
            });
        }

        Ok(rows)
    }

    async fn verify_connectivity(&self) -> Result<()> {
        let mut stream = self
            .graph
            .execute(query("RETURN 1 AS ok"))
            .await
            .map_err(|e| WayangError::Database(format!("Connectivity check failed: {e}")))?;

        while stream
            .next()
            .await
            .map_err(|e| WayangError::Database(format!("Connectivity check failed: {e}")))?
            .is_some()
        {}

        Ok(())
    }
}

//! Graph import
//!
//! Cypher statement builders and the importer that loads entity and
//! relation records into a [`GraphStore`].

use std::time::Duration;

use wayang_core::{EntityLabel, EntityRecord, GraphConfig, RelationRecord, Result, WayangError};

use crate::GraphStore;

const FALLBACK_RELATION_TYPE: &str = "RELATED_TO";

// ============================================================================
// Statement builders
// ============================================================================

/// Node upsert for one label
///
/// Labels cannot be query parameters, so the label is interpolated. It comes
/// from a closed enum.
pub fn entity_merge_statement(label: EntityLabel) -> String {
    format!(
        "MERGE (n:{} {{name: $name}}) SET n.stories = $stories, n.confidence = $confidence",
        label.as_str()
    )
}

/// Edge upsert for one relation type
pub fn relation_merge_statement(relation_type: &str) -> String {
    format!(
        "MATCH (a {{name: $source}}) MATCH (b {{name: $target}}) \
         MERGE (a)-[r:{}]->(b) SET r.source_story = $story",
        sanitize_relation_type(relation_type)
    )
}

/// Make a relation type safe to splice into Cypher
pub fn sanitize_relation_type(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_uppercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    if cleaned.is_empty() {
        FALLBACK_RELATION_TYPE.to_string()
    } else {
        cleaned
    }
}

// ============================================================================
// Importer
// ============================================================================

/// Counts from one import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub entities_merged: usize,
    pub relations_merged: usize,
    /// Relations missing a source or target
    pub relations_skipped: usize,
}

/// Loads records into a graph store
pub struct GraphImporter<'a> {
    store: &'a dyn GraphStore,
    connect_attempts: u32,
    connect_retry: Duration,
}

impl<'a> GraphImporter<'a> {
    pub fn new(store: &'a dyn GraphStore, config: &GraphConfig) -> Self {
        Self {
            store,
            connect_attempts: config.connect_attempts.max(1),
            connect_retry: Duration::from_millis(config.connect_retry_ms),
        }
    }

    /// Poll the store until it answers or attempts run out
    pub async fn wait_for_connectivity(&self) -> Result<()> {
        let mut last_error = None;

        for attempt in 1..=self.connect_attempts {
            match self.store.verify_connectivity().await {
                Ok(()) => {
                    tracing::info!(attempt, "graph database reachable");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, max = self.connect_attempts, error = %e, "graph database not ready");
                    last_error = Some(e);
                }
            }
            if attempt < self.connect_attempts {
                tokio::time::sleep(self.connect_retry).await;
            }
        }

        Err(WayangError::Database(format!(
            "graph database unreachable after {} attempts: {}",
            self.connect_attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Merge all nodes, then all edges
    pub async fn import(
        &self,
        entities: &[EntityRecord],
        relations: &[RelationRecord],
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        tracing::info!(count = entities.len(), "importing entities");
        for entity in entities {
            self.store.merge_entity(entity).await?;
            summary.entities_merged += 1;
        }

        tracing::info!(count = relations.len(), "importing relations");
        for relation in relations {
            if !relation.has_endpoints() {
                summary.relations_skipped += 1;
                continue;
            }
            self.store.merge_relation(relation).await?;
            summary.relations_merged += 1;
        }

        tracing::info!(
            entities = summary.entities_merged,
            relations = summary.relations_merged,
            skipped = summary.relations_skipped,
            "graph import finished"
        );

        Ok(summary)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-memory store that records the statements it would run
    #[derive(Default)]
    struct RecordingStore {
        statements: Mutex<Vec<String>>,
        failures_before_ready: AtomicU32,
    }

    #[async_trait]
    impl GraphStore for RecordingStore {
        async fn merge_entity(&self, entity: &EntityRecord) -> Result<()> {
            self.statements
                .lock()
                .unwrap()
                .push(format!("{} <- {}", entity_merge_statement(entity.label), entity.name));
            Ok(())
        }

        async fn merge_relation(&self, relation: &RelationRecord) -> Result<()> {
            self.statements
                .lock()
                .unwrap()
                .push(relation_merge_statement(&relation.relation_type));
            Ok(())
        }

        async fn run_read(&self, _cypher: &str) -> Result<Vec<GraphRow>> {
            Ok(Vec::new())
        }

        async fn verify_connectivity(&self) -> Result<()> {
            let remaining = self.failures_before_ready.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_before_ready.store(remaining - 1, Ordering::SeqCst);
                return Err(WayangError::Database("connection refused".to_string()));
            }
            Ok(())
        }
    }

    fn fast_config(attempts: u32) -> GraphConfig {
        GraphConfig {
            connect_attempts: attempts,
            connect_retry_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_relation_type() {
        assert_eq!(sanitize_relation_type("king of"), "KING_OF");
        assert_eq!(sanitize_relation_type("SON_OF`]->() DETACH DELETE"), "SON_OF_DETACH_DELETE");
        assert_eq!(sanitize_relation_type("!!"), "RELATED_TO");
        assert_eq!(sanitize_relation_type(""), "RELATED_TO");
    }

    #[test]
    fn test_statements() {
        assert_eq!(
            entity_merge_statement(EntityLabel::Location),
            "MERGE (n:Location {name: $name}) SET n.stories = $stories, n.confidence = $confidence"
        );
        assert_eq!(
            relation_merge_statement("killed by"),
            "MATCH (a {name: $source}) MATCH (b {name: $target}) \
             MERGE (a)-[r:KILLED_BY]->(b) SET r.source_story = $story"
        );
    }

    #[tokio::test]
    async fn test_import_nodes_then_edges() {
        let store = RecordingStore::default();
        let importer = GraphImporter::new(&store, &fast_config(1));

        let entities = vec![
            EntityRecord::new("Prabu Basukesti", EntityLabel::Person, 0.97),
            EntityRecord::new("Wirata", EntityLabel::Location, 0.91),
        ];
        let relations = vec![
            RelationRecord::new("Prabu Basukesti", "KING_OF", "Wirata"),
            RelationRecord::new("", "KING_OF", "Wirata"),
        ];

        let summary = importer.import(&entities, &relations).await.unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                entities_merged: 2,
                relations_merged: 1,
                relations_skipped: 1,
            }
        );
        let statements = store.statements.lock().unwrap();
        assert!(statements[0].starts_with("MERGE (n:Person"));
        assert!(statements[2].contains("[r:KING_OF]"));
    }

    #[tokio::test]
    async fn test_wait_for_connectivity_retries() {
        let store = RecordingStore {
            failures_before_ready: AtomicU32::new(2),
            ..Default::default()
        };
        GraphImporter::new(&store, &fast_config(3))
            .wait_for_connectivity()
            .await
            .unwrap();

        let store = RecordingStore {
            failures_before_ready: AtomicU32::new(5),
            ..Default::default()
        };
        let err = GraphImporter::new(&store, &fast_config(3))
            .wait_for_connectivity()
            .await
            .unwrap_err();
        assert!(matches!(err, WayangError::Database(_)));
    }
}

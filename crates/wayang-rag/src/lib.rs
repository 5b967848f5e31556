//! Wayang RAG - Hybrid graph + document question answering
//!
//! Answers a question by combining two retrieval paths:
//! - structured facts read from the knowledge graph through a generated
//!   Cypher query
//! - narrative passages from the semantic index
//!
//! Both are handed to the generative model in one synthesis prompt.

use std::sync::Arc;

use serde::Serialize;
use wayang_core::{strip_code_fence, LlmClient, RagConfig, Result};
use wayang_graph::{GraphRow, GraphStore};

pub mod embedding;
pub mod index;
pub mod llm;

pub use embedding::{
    create_embedding_client, GeminiEmbedding, OllamaEmbedding, OpenAiEmbedding, TaskType,
    GEMINI_BATCH_LIMIT,
};
pub use index::{Document, ScoredDocument, SemanticIndex, EMBED_BATCH_SIZE};
pub use llm::{create_llm_client, GeminiClient, OllamaClient, OpenAiClient};

/// Relation types the graph schema advertises to the query generator
pub const SCHEMA_RELATIONSHIPS: [&str; 15] = [
    "KING_OF",
    "ALLY_OF",
    "FATHER_OF",
    "SON_OF",
    "MARRIED_TO",
    "DAUGHTER_OF",
    "MOTHER_OF",
    "SIBLING_OF",
    "MENTOR_OF",
    "STUDENT_OF",
    "LEADER_OF",
    "ENEMY_OF",
    "KILLED_BY",
    "USES_WEAPON",
    "LOCATED_IN",
];

// ============================================================================
// Cypher generation
// ============================================================================

/// Text-to-Cypher translator
pub struct CypherGenerator {
    llm: Arc<dyn LlmClient>,
}

impl CypherGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Build the query generation prompt
    pub fn build_prompt(&self, question: &str) -> String {
        format!(
            "Task: Generate a Neo4j Cypher query.\n\
             STRICT SCHEMA:\n\
             Node Properties: name (String)\n\
             Relationship Types: {}\n\
             RULES:\n\
             1. Use 'WHERE toLower(n.name) CONTAINS toLower(\"...\")' for names.\n\
             2. Follow direction: (Victim)-[:KILLED_BY]->(Killer), (Child)-[:SON_OF]->(Parent).\n\
             3. Return keys: source, relationship, target.\n\
             Question: \"{question}\"\n\
             Output: Cypher query ONLY.",
            SCHEMA_RELATIONSHIPS.join(", ")
        )
    }

    /// Generate a read query for a question
    pub async fn generate(&self, question: &str) -> Result<String> {
        let reply = self.llm.generate(&self.build_prompt(question)).await?;
        Ok(strip_code_fence(&reply))
    }
}

// ============================================================================
// Hybrid answering
// ============================================================================

/// Answer plus the evidence it was built from
#[derive(Debug, Clone, Serialize)]
pub struct HybridAnswer {
    pub answer: String,
    /// Generated query; empty when generation failed
    pub cypher: String,
    pub graph_rows: Vec<GraphRow>,
    pub documents: Vec<ScoredDocument>,
}

/// Build the synthesis prompt from both evidence sources
pub fn build_hybrid_prompt(
    question: &str,
    graph_rows: &[GraphRow],
    documents: &[ScoredDocument],
) -> String {
    let graph_json = serde_json::to_string_pretty(graph_rows).unwrap_or_else(|_| "[]".to_string());
    let blobs: Vec<String> = documents.iter().map(|d| d.document.blob()).collect();
    let docs_json = serde_json::to_string_pretty(&blobs).unwrap_or_else(|_| "[]".to_string());

    format!(
        "User Question: {question}\n\n\
         [SOURCE 1: KNOWLEDGE GRAPH (Structured Facts)]\n\
         {graph_json}\n\n\
         [SOURCE 2: SEMANTIC DOCUMENTS (Contextual Story)]\n\
         {docs_json}\n\n\
         Instruction: Synthesize an answer in Indonesian.\n\
         - Use the Graph for precise relationships (Who is father of whom).\n\
         - Use the Documents for narrative details (How did it happen)."
    )
}

/// Graph + vector question answering
pub struct HybridAnswerer {
    llm: Arc<dyn LlmClient>,
    graph: Arc<dyn GraphStore>,
    index: SemanticIndex,
    cypher: CypherGenerator,
    top_k: usize,
}

impl HybridAnswerer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        graph: Arc<dyn GraphStore>,
        index: SemanticIndex,
        config: &RagConfig,
    ) -> Self {
        Self {
            cypher: CypherGenerator::new(llm.clone()),
            llm,
            graph,
            index,
            top_k: config.top_k,
        }
    }

    /// Graph facts for a question; failures degrade to no facts
    async fn graph_context(&self, question: &str) -> (String, Vec<GraphRow>) {
        let cypher = match self.cypher.generate(question).await {
            Ok(cypher) => cypher,
            Err(error) => {
                tracing::warn!(%error, "cypher generation failed");
                return (String::new(), Vec::new());
            }
        };
        tracing::debug!(%cypher, "generated cypher");

        match self.graph.run_read(&cypher).await {
            Ok(rows) => (cypher, rows),
            Err(error) => {
                tracing::warn!(%error, %cypher, "graph query failed");
                (cypher, Vec::new())
            }
        }
    }

    /// Answer a question
    pub async fn answer(&self, question: &str) -> Result<HybridAnswer> {
        let documents = match self.index.search(question, self.top_k).await {
            Ok(documents) => documents,
            Err(error) => {
                tracing::warn!(%error, "semantic search failed");
                Vec::new()
            }
        };
        let (cypher, graph_rows) = self.graph_context(question).await;

        tracing::info!(
            documents = documents.len(),
            facts = graph_rows.len(),
            "synthesizing answer"
        );
        let prompt = build_hybrid_prompt(question, &graph_rows, &documents);
        let answer = self.llm.generate(&prompt).await?.trim().to_string();

        Ok(HybridAnswer {
            answer,
            cypher,
            graph_rows,
            documents,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wayang_core::{CorpusRow, EmbeddingClient, EntityRecord, RelationRecord, WayangError};

    /// LLM that answers Cypher prompts and synthesis prompts differently
    #[derive(Default)]
    struct RoutingLlm {
        prompts: Mutex<Vec<String>>,
        fail_cypher: bool,
    }

    #[async_trait]
    impl LlmClient for RoutingLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.starts_with("Task: Generate a Neo4j Cypher query.") {
                if self.fail_cypher {
                    return Err(WayangError::Llm("quota exceeded".to_string()));
                }
                return Ok("```cypher\nMATCH (a)-[r:SON_OF]->(b) RETURN a.name AS source, type(r) AS relationship, b.name AS target\n```".to_string());
            }
            Ok("  Bambang Sakri adalah putra Bambang Satrukem.  ".to_string())
        }
    }

    struct FixedGraph {
        rows: Option<Vec<GraphRow>>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GraphStore for FixedGraph {
        async fn merge_entity(&self, _entity: &EntityRecord) -> Result<()> {
            Ok(())
        }

        async fn merge_relation(&self, _relation: &RelationRecord) -> Result<()> {
            Ok(())
        }

        async fn run_read(&self, cypher: &str) -> Result<Vec<GraphRow>> {
            self.queries.lock().unwrap().push(cypher.to_string());
            self.rows
                .clone()
                .ok_or_else(|| WayangError::Database("syntax error".to_string()))
        }

        async fn verify_connectivity(&self) -> Result<()> {
            Ok(())
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingClient for UnitEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    async fn answerer(llm: Arc<RoutingLlm>, graph: Arc<FixedGraph>) -> HybridAnswerer {
        let index = SemanticIndex::build(
            vec![CorpusRow::new("Sakri Lahir", "Bambang Sakri lahir di pertapaan.")],
            Arc::new(UnitEmbedder),
        )
        .await
        .unwrap();
        HybridAnswerer::new(llm, graph, index, &RagConfig::default())
    }

    #[test]
    fn test_cypher_prompt_rules() {
        let generator = CypherGenerator::new(Arc::new(RoutingLlm::default()));
        let prompt = generator.build_prompt("Siapa ayah Bambang Sakri?");
        assert!(prompt.contains("toLower(n.name) CONTAINS"));
        assert!(prompt.contains("(Child)-[:SON_OF]->(Parent)"));
        assert!(prompt.contains("Question: \"Siapa ayah Bambang Sakri?\""));
    }

    #[test]
    fn test_hybrid_prompt_contains_both_sources() {
        let rows = vec![GraphRow::new("Bambang Sakri", "SON_OF", "Bambang Satrukem")];
        let prompt = build_hybrid_prompt("Siapa ayah Bambang Sakri?", &rows, &[]);
        assert!(prompt.contains("\"relationship\": \"SON_OF\""));
        assert!(prompt.contains("[SOURCE 2: SEMANTIC DOCUMENTS (Contextual Story)]\n[]"));
        assert!(prompt.contains("Synthesize an answer in Indonesian"));
    }

    #[tokio::test]
    async fn test_answer_uses_graph_and_documents() {
        let llm = Arc::new(RoutingLlm::default());
        let graph = Arc::new(FixedGraph {
            rows: Some(vec![GraphRow::new("Bambang Sakri", "SON_OF", "Bambang Satrukem")]),
            queries: Mutex::new(Vec::new()),
        });

        let result = answerer(llm.clone(), graph.clone())
            .await
            .answer("Siapa ayah Bambang Sakri?")
            .await
            .unwrap();

        assert_eq!(result.answer, "Bambang Sakri adalah putra Bambang Satrukem.");
        assert!(result.cypher.starts_with("MATCH (a)-[r:SON_OF]->(b)"));
        assert_eq!(graph.queries.lock().unwrap()[0], result.cypher);
        assert_eq!(result.graph_rows.len(), 1);
        assert_eq!(result.documents.len(), 1);

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[1].contains("Bambang Satrukem"));
        assert!(prompts[1].contains("Title: Sakri Lahir"));
    }

    #[tokio::test]
    async fn test_graph_failure_degrades_to_documents() {
        let llm = Arc::new(RoutingLlm::default());
        let graph = Arc::new(FixedGraph {
            rows: None,
            queries: Mutex::new(Vec::new()),
        });

        let result = answerer(llm, graph)
            .await
            .answer("Siapa ayah Bambang Sakri?")
            .await
            .unwrap();

        assert!(result.graph_rows.is_empty());
        assert!(!result.cypher.is_empty());
        assert_eq!(result.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_cypher_failure_skips_graph() {
        let llm = Arc::new(RoutingLlm {
            fail_cypher: true,
            ..Default::default()
        });
        let graph = Arc::new(FixedGraph {
            rows: Some(Vec::new()),
            queries: Mutex::new(Vec::new()),
        });

        let result = answerer(llm, graph.clone())
            .await
            .answer("Siapa ayah Bambang Sakri?")
            .await
            .unwrap();

        assert!(result.cypher.is_empty());
        assert!(graph.queries.lock().unwrap().is_empty());
    }
}

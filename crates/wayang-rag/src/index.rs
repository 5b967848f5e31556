//! In-memory semantic index
//!
//! Every corpus row becomes one document. Document embeddings live in a
//! single `ndarray` matrix and queries are ranked by dot product, which is
//! cosine similarity for the normalized vectors embedding APIs return.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use serde::Serialize;
use wayang_core::{CorpusRow, EmbeddingClient, Result, WayangError};

/// Documents sent to the embedder per call
pub const EMBED_BATCH_SIZE: usize = 100;

/// One retrievable document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub subtitle: Option<String>,
    pub text: String,
}

impl Document {
    /// Text that gets embedded and shown to the answer model
    pub fn blob(&self) -> String {
        format!(
            "Title: {} | Sub: {}\nContent: {}",
            self.title,
            self.subtitle.as_deref().unwrap_or(""),
            self.text
        )
    }
}

impl From<CorpusRow> for Document {
    fn from(row: CorpusRow) -> Self {
        Self {
            title: row.title,
            subtitle: row.subtitle,
            text: row.text,
        }
    }
}

/// Search hit
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Embedded document collection
pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingClient>,
    documents: Vec<Document>,
    /// One row per document
    embeddings: Array2<f32>,
}

impl SemanticIndex {
    /// Index with no documents; every search returns nothing
    pub fn empty(embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            embedder,
            documents: Vec::new(),
            embeddings: Array2::zeros((0, 0)),
        }
    }

    /// Embed every row, [`EMBED_BATCH_SIZE`] documents per call
    pub async fn build(rows: Vec<CorpusRow>, embedder: Arc<dyn EmbeddingClient>) -> Result<Self> {
        let documents: Vec<Document> = rows.into_iter().map(Document::from).collect();
        if documents.is_empty() {
            return Ok(Self::empty(embedder));
        }

        tracing::info!(count = documents.len(), "embedding documents");
        let blobs: Vec<String> = documents.iter().map(Document::blob).collect();
        let mut vectors = Vec::with_capacity(blobs.len());
        for batch in blobs.chunks(EMBED_BATCH_SIZE) {
            vectors.extend(embedder.embed_documents(batch).await?);
        }
        let embeddings = stack_rows(vectors, documents.len())?;

        Ok(Self {
            embedder,
            documents,
            embeddings,
        })
    }

    /// Build the index, falling back to an empty one when embedding fails
    pub async fn build_or_empty(rows: Vec<CorpusRow>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        match Self::build(rows, embedder.clone()).await {
            Ok(index) => index,
            Err(error) => {
                tracing::warn!(%error, "semantic index unavailable, answering from the graph only");
                Self::empty(embedder)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Top `top_k` documents for a query, best first
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query = Array1::from(self.embedder.embed_query(query).await?);
        if query.len() != self.embeddings.ncols() {
            return Err(WayangError::Llm(format!(
                "query embedding has {} dimensions, index has {}",
                query.len(),
                self.embeddings.ncols()
            )));
        }

        let scores = self.embeddings.dot(&query);
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(i, score)| ScoredDocument {
                document: self.documents[i].clone(),
                score,
            })
            .collect())
    }
}

/// Pack equal-length vectors into a matrix
fn stack_rows(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Array2<f32>> {
    if vectors.len() != expected {
        return Err(WayangError::Llm(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }

    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = vectors.iter().position(|v| v.len() != dim) {
        return Err(WayangError::Llm(format!(
            "embedding {bad} has {} dimensions, expected {dim}",
            vectors[bad].len()
        )));
    }

    let flat: Vec<f32> = vectors.into_iter().flatten().collect();
    Array2::from_shape_vec((expected, dim), flat)
        .map_err(|e| WayangError::Llm(format!("embedding matrix: {e}")))
}

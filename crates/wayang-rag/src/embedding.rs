//! Embedding clients for generating vector representations
//!
//! Supports OpenAI, Ollama, and Gemini embedding APIs. Gemini distinguishes
//! query and document embeddings through its task type.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use wayang_core::{EmbeddingClient, LlmConfig, LlmProvider, Result, WayangError};

use crate::llm::{http_client, GeminiContent, GEMINI_BASE_URL};

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| WayangError::Config("OpenAI API key required".to_string()))?;

        let mut client = Self::new(api_key.clone(), config.embedding_model.clone());
        client.client = http_client(config.timeout_secs)?;
        if let Some(url) = &config.openai_base_url {
            client.base_url = url.clone();
        }
        Ok(client)
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_documents(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| WayangError::Llm("No embedding returned".to_string()))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OpenAiEmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| WayangError::Llm(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WayangError::Llm(format!(
                "OpenAI embedding error: {error_text}"
            )));
        }

        let result: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| WayangError::Llm(format!("Failed to parse embedding response: {e}")))?;

        let mut embeddings = result.data;
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.ollama_url.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| WayangError::Llm(format!("Ollama embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WayangError::Llm(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| WayangError::Llm(format!("Failed to parse embedding response: {e}")))?;

        Ok(result.embedding)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // No batch endpoint; one request per text
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_query(text).await?);
        }
        Ok(results)
    }
}

// ============================================================================
// Gemini Embedding Client
// ============================================================================

/// Gemini task type for an embedding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

/// Google Gemini embedding client
pub struct GeminiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
    task_type: TaskType,
}

/// Most requests `batchEmbedContents` accepts in one call
pub const GEMINI_BATCH_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
struct GeminiBatchRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiEmbedding {
    /// Create a new Gemini embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .as_ref()
            .ok_or_else(|| WayangError::Config("Gemini API key required".to_string()))?;

        let mut client = Self::new(api_key.clone(), config.embedding_model.clone());
        client.client = http_client(config.timeout_secs)?;
        Ok(client)
    }

    fn request(&self, text: &str, task_type: TaskType) -> GeminiEmbedRequest {
        GeminiEmbedRequest {
            model: format!("models/{}", self.model),
            content: GeminiContent::text(text),
            task_type,
        }
    }

    /// Split document texts into batches the API accepts
    fn batch_requests(&self, texts: &[String]) -> Vec<GeminiBatchRequest> {
        texts
            .chunks(GEMINI_BATCH_LIMIT)
            .map(|chunk| GeminiBatchRequest {
                requests: chunk
                    .iter()
                    .map(|t| self.request(t, TaskType::RetrievalDocument))
                    .collect(),
            })
            .collect()
    }

    async fn post<B: Serialize>(&self, method: &str, body: &B) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/models/{}:{method}", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| WayangError::Llm(format!("Gemini embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WayangError::Llm(format!(
                "Gemini embedding error: {error_text}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| WayangError::Llm(format!("Failed to read embedding response: {e}")))
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let body = self
            .post("embedContent", &self.request(text, TaskType::RetrievalQuery))
            .await?;

        let result: GeminiEmbedResponse = serde_json::from_str(&body)
            .map_err(|e| WayangError::Llm(format!("Failed to parse embedding response: {e}")))?;
        Ok(result.embedding.values)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for request in self.batch_requests(texts) {
            let expected = request.requests.len();
            let body = self.post("batchEmbedContents", &request).await?;

            let result: GeminiBatchResponse = serde_json::from_str(&body).map_err(|e| {
                WayangError::Llm(format!("Failed to parse embedding response: {e}"))
            })?;

            if result.embeddings.len() != expected {
                return Err(WayangError::Llm(format!(
                    "Expected {expected} embeddings, got {}",
                    result.embeddings.len()
                )));
            }
            results.extend(result.embeddings.into_iter().map(|e| e.values));
        }

        Ok(results)
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &LlmConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        LlmProvider::OpenAI => Ok(Box::new(OpenAiEmbedding::from_config(config)?)),
        LlmProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config)?)),
        LlmProvider::Gemini => Ok(Box::new(GeminiEmbedding::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_batch_request_shape() {
        let client = GeminiEmbedding::new("test-key", "text-embedding-004");
        let request = GeminiBatchRequest {
            requests: vec![client.request("Prabu Basukesti", TaskType::RetrievalDocument)],
        };

        let json = serde_json::to_value(&request).unwrap();
        let first = &json["requests"][0];
        assert_eq!(first["model"], "models/text-embedding-004");
        assert_eq!(first["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(first["content"]["parts"][0]["text"], "Prabu Basukesti");
    }

    #[test]
    fn test_gemini_batches_respect_limit() {
        let client = GeminiEmbedding::new("test-key", "text-embedding-004");
        let texts: Vec<String> = (0..201).map(|i| format!("cerita {i}")).collect();

        let batches = client.batch_requests(&texts);
        let sizes: Vec<usize> = batches.iter().map(|b| b.requests.len()).collect();
        assert_eq!(sizes, vec![100, 100, 1]);

        let last = serde_json::to_value(&batches[2]).unwrap();
        assert_eq!(last["requests"][0]["content"]["parts"][0]["text"], "cerita 200");
        assert!(client.batch_requests(&[]).is_empty());
    }

    #[test]
    fn test_gemini_batch_response_parse() {
        let body = r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#;
        let parsed: GeminiBatchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[1].values, vec![0.3, 0.4]);
    }

    #[test]
    fn test_ollama_from_config() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            embedding_model: "nomic-embed-text".to_string(),
            ..Default::default()
        };
        let client = OllamaEmbedding::from_config(&config).unwrap();
        assert_eq!(client.model, "nomic-embed-text");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let client = OpenAiEmbedding::new("test-key", "text-embedding-3-small");
        assert!(client.embed_documents(&[]).await.unwrap().is_empty());
    }
}

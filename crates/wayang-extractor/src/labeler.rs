//! HTTP span labeler
//!
//! Calls a hosted token-classification endpoint (Hugging Face inference
//! API shape) and converts its aggregated entities into [`RawSpan`]s.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use wayang_core::{NerConfig, Result, WayangError};

use crate::{LabelGroup, RawSpan, SpanLabeler};

/// Token classification endpoint client
pub struct HttpSpanLabeler {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct LabelRequest<'a> {
    inputs: &'a str,
    parameters: LabelParameters,
}

#[derive(Debug, Serialize)]
struct LabelParameters {
    aggregation_strategy: &'static str,
}

#[derive(Debug, Deserialize)]
struct LabeledEntity {
    entity_group: String,
    score: f32,
    start: usize,
    end: usize,
}

impl From<LabeledEntity> for RawSpan {
    fn from(e: LabeledEntity) -> Self {
        RawSpan::new(e.start, e.end, LabelGroup::from_tag(&e.entity_group), e.score)
    }
}

impl HttpSpanLabeler {
    /// Create a new labeler for an endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_token: None,
        }
    }

    /// Create from config
    pub fn from_config(config: &NerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WayangError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
        })
    }
}

/// Parse an endpoint response body into spans
pub fn parse_spans(body: &str) -> Result<Vec<RawSpan>> {
    let entities: Vec<LabeledEntity> = serde_json::from_str(body)
        .map_err(|e| WayangError::Labeler(format!("Failed to parse response: {e}")))?;
    Ok(entities.into_iter().map(RawSpan::from).collect())
}

#[async_trait]
impl SpanLabeler for HttpSpanLabeler {
    async fn label(&self, text: &str) -> Result<Vec<RawSpan>> {
        let request = LabelRequest {
            inputs: text,
            parameters: LabelParameters {
                aggregation_strategy: "simple",
            },
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| WayangError::Labeler(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WayangError::Labeler(format!("{status}: {error_text}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WayangError::Labeler(format!("Failed to read response: {e}")))?;

        parse_spans(&body)
    }
}

//! OpenAI-compatible embedding provider

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::embedding::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClientTrait;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Calls `POST {base_url}/v1/embeddings`. Every failure surfaces as
/// `EmbeddingUnavailable` so callers only have one case to degrade on.
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    auth_header: Option<String>,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiEmbeddingProvider<C> {
    pub fn new(client: C, api_key: Option<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(client: C, api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            auth_header: api_key
                .filter(|k| !k.is_empty())
                .map(|k| format!("Bearer {}", k)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers = vec![("Content-Type", "application/json")];
        if let Some(auth) = &self.auth_header {
            headers.push(("Authorization", auth.as_str()));
        }
        headers
    }

    fn build_request(request: &EmbeddingRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model(),
            "input": request.input(),
        });

        if let Some(dims) = request.dimensions() {
            body["dimensions"] = serde_json::json!(dims);
        }

        body
    }

    fn parse_response(json: serde_json::Value) -> Result<EmbeddingResponse, DomainError> {
        let response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::embedding_unavailable(format!("Failed to parse embedding response: {}", e))
        })?;

        let data = response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .ok_or_else(|| DomainError::embedding_unavailable("Embedding response had no data"))?;

        if data.embedding.is_empty() {
            return Err(DomainError::embedding_unavailable("Embedding vector was empty"));
        }

        Ok(EmbeddingResponse::new(
            response.model,
            data.embedding,
            response.usage.map(|u| u.prompt_tokens).unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for OpenAiEmbeddingProvider<C> {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
        let body = Self::build_request(&request);

        let json = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await
            .map_err(|e| DomainError::embedding_unavailable(e.to_string()))?;

        Self::parse_response(json)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    model: String,
    data: Vec<OpenAiEmbeddingData>,
    usage: Option<OpenAiEmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingUsage {
    prompt_tokens: u32,
}

//! Client for a remote vector search service
//!
//! Speaks a small JSON protocol compatible with Vectorize-style services:
//! `POST {base}/upsert` with `{"vectors": [{"id", "values", "metadata"}]}` and
//! `POST {base}/query` with `{"vector", "topK", "returnMetadata"}`, answered by
//! `{"matches": [{"id", "score", "metadata"}]}` (optionally wrapped in `"result"`).

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::cache::CacheKey;
use crate::domain::semantic_cache::{EmbeddingMetadata, SimilarityMatch, VectorIndex};
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClientTrait;

#[derive(Debug)]
pub struct HttpVectorIndex<C: HttpClientTrait> {
    client: C,
    base_url: String,
    auth_header: Option<String>,
}

impl<C: HttpClientTrait> HttpVectorIndex<C> {
    pub fn new(client: C, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_header: api_key
                .filter(|k| !k.is_empty())
                .map(|k| format!("Bearer {}", k)),
        }
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers = vec![("Content-Type", "application/json")];
        if let Some(auth) = &self.auth_header {
            headers.push(("Authorization", auth.as_str()));
        }
        headers
    }

    fn parse_matches(json: serde_json::Value) -> Result<Vec<SimilarityMatch>, DomainError> {
        let json = match json.get("result") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => json,
        };

        let response: QueryResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::index_unavailable(format!("Failed to parse query response: {}", e))
        })?;

        let mut matches: Vec<SimilarityMatch> = response
            .matches
            .into_iter()
            .map(|m| {
                let metadata = m
                    .metadata
                    .and_then(|v| serde_json::from_value::<EmbeddingMetadata>(v).ok());
                let found = SimilarityMatch::new(CacheKey::new(m.id), m.score);
                match metadata {
                    Some(metadata) => found.with_metadata(metadata),
                    None => found,
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(matches)
    }
}

#[async_trait]
impl<C: HttpClientTrait> VectorIndex for HttpVectorIndex<C> {
    async fn upsert(
        &self,
        id: &CacheKey,
        vector: Vec<f32>,
        metadata: EmbeddingMetadata,
    ) -> Result<(), DomainError> {
        let body = serde_json::json!({
            "vectors": [{
                "id": id.as_str(),
                "values": vector,
                "metadata": metadata,
            }]
        });

        self.client
            .post_json(&format!("{}/upsert", self.base_url), self.headers(), &body)
            .await
            .map_err(|e| DomainError::index_unavailable(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>, DomainError> {
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "returnMetadata": "all",
        });

        let json = self
            .client
            .post_json(&format!("{}/query", self.base_url), self.headers(), &body)
            .await
            .map_err(|e| DomainError::index_unavailable(e.to_string()))?;

        let mut matches = Self::parse_matches(json)?;
        matches.truncate(top_k);
        Ok(matches)
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

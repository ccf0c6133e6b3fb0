//! Vector index trait and types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::domain::cache::CacheKey;
use crate::domain::DomainError;

/// Metadata stored with every indexed embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub cache_key: CacheKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub caller_prefix: String,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingMetadata {
    pub fn new(cache_key: CacheKey, caller_prefix: impl Into<String>) -> Self {
        Self {
            cache_key,
            model: None,
            caller_prefix: caller_prefix.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// One nearest-neighbor result; `score` is cosine similarity, higher is closer
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub cache_key: CacheKey,
    pub score: f32,
    pub metadata: Option<EmbeddingMetadata>,
}

impl SimilarityMatch {
    pub fn new(cache_key: CacheKey, score: f32) -> Self {
        Self {
            cache_key,
            score,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: EmbeddingMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Matches without a recorded model are never excluded by model scoping.
    pub fn is_compatible_with_model(&self, model: Option<&str>) -> bool {
        match (model, self.metadata.as_ref().and_then(|m| m.model.as_deref())) {
            (Some(requested), Some(stored)) => requested == stored,
            _ => true,
        }
    }
}

/// Approximate nearest-neighbor store keyed by cache key
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces the vector stored under `id`
    async fn upsert(
        &self,
        id: &CacheKey,
        vector: Vec<f32>,
        metadata: EmbeddingMetadata,
    ) -> Result<(), DomainError>;

    /// Returns up to `top_k` matches ordered by descending score
    async fn query(&self, vector: Vec<f32>, top_k: usize)
        -> Result<Vec<SimilarityMatch>, DomainError>;

    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_compatibility() {
        let metadata = EmbeddingMetadata::new(CacheKey::new("k"), "caller")
            .with_model(Some("gpt-4o".to_string()));
        let scoped = SimilarityMatch::new(CacheKey::new("k"), 0.9).with_metadata(metadata);
        let unscoped = SimilarityMatch::new(CacheKey::new("k"), 0.9);

        assert!(scoped.is_compatible_with_model(Some("gpt-4o")));
        assert!(!scoped.is_compatible_with_model(Some("mistral")));
        assert!(scoped.is_compatible_with_model(None));
        assert!(unscoped.is_compatible_with_model(Some("mistral")));
    }

    #[test]
    fn test_metadata_serialization() {
        let metadata = EmbeddingMetadata::new(CacheKey::new("abc"), "sk-12345");
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["cache_key"], "abc");
        assert_eq!(json["caller_prefix"], "sk-12345");
        assert!(json.get("model").is_none());

        let back: EmbeddingMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }
}

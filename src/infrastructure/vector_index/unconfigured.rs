//! Stand-in used when no vector index is configured

use async_trait::async_trait;

use crate::domain::cache::CacheKey;
use crate::domain::semantic_cache::{EmbeddingMetadata, SimilarityMatch, VectorIndex};
use crate::domain::DomainError;

/// Every operation reports `IndexUnavailable`, which the semantic path treats as zero matches.
#[derive(Debug, Default)]
pub struct UnconfiguredVectorIndex;

#[async_trait]
impl VectorIndex for UnconfiguredVectorIndex {
    async fn upsert(
        &self,
        _id: &CacheKey,
        _vector: Vec<f32>,
        _metadata: EmbeddingMetadata,
    ) -> Result<(), DomainError> {
        Err(DomainError::index_unavailable("no vector index configured"))
    }

    async fn query(
        &self,
        _vector: Vec<f32>,
        _top_k: usize,
    ) -> Result<Vec<SimilarityMatch>, DomainError> {
        Err(DomainError::index_unavailable("no vector index configured"))
    }

    fn backend_name(&self) -> &'static str {
        "none"
    }
}

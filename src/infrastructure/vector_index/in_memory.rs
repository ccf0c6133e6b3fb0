//! In-memory vector index using linear search
//!
//! Suitable for development and single-node deployments. Every query scans
//! all stored vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::cache::CacheKey;
use crate::domain::embedding::cosine_similarity;
use crate::domain::semantic_cache::{EmbeddingMetadata, SimilarityMatch, VectorIndex};
use crate::domain::DomainError;

#[derive(Debug)]
struct IndexedVector {
    vector: Vec<f32>,
    metadata: EmbeddingMetadata,
}

#[derive(Debug)]
pub struct InMemoryVectorIndex {
    entries: RwLock<HashMap<CacheKey, IndexedVector>>,
    max_entries: usize,
}

impl InMemoryVectorIndex {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the oldest vector once the index is full
    fn evict_if_needed(&self, entries: &mut HashMap<CacheKey, IndexedVector>) {
        if entries.len() < self.max_entries {
            return;
        }

        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.metadata.created_at)
            .map(|(id, _)| id.clone())
        {
            entries.remove(&oldest);
        }
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        id: &CacheKey,
        vector: Vec<f32>,
        metadata: EmbeddingMetadata,
    ) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::index_unavailable(format!("Failed to acquire write lock: {}", e)))?;

        if !entries.contains_key(id) {
            self.evict_if_needed(&mut entries);
        }
        entries.insert(id.clone(), IndexedVector { vector, metadata });

        Ok(())
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::index_unavailable(format!("Failed to acquire read lock: {}", e)))?;

        let mut matches: Vec<SimilarityMatch> = entries
            .iter()
            .map(|(id, entry)| {
                SimilarityMatch::new(id.clone(), cosine_similarity(&vector, &entry.vector))
                    .with_metadata(entry.metadata.clone())
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);

        Ok(matches)
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}

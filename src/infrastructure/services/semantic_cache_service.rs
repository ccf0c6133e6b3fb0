//! Semantic lookup and indexing
//!
//! Embeds the request text, queries the vector index, lets the adaptive
//! threshold decide which neighbors count, and resolves a chosen neighbor
//! through the exact-match store. Every failure on this path degrades to a miss.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, instrument, warn};

use crate::domain::cache::{CacheKey, CachedResponse, ResponseStore};
use crate::domain::embedding::{EmbeddingProvider, EmbeddingRequest};
use crate::domain::semantic_cache::{
    EmbeddingMetadata, SemanticCacheConfig, SimilarityMatch, VectorIndex,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::{
    record_cache_lookup, record_similarity, CacheTier, LookupOutcome,
};
use crate::infrastructure::semantic_cache::{AdaptiveThresholdEstimator, CallerSnapshot};

/// What a semantic lookup needs to know about the request
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticQuery {
    pub text: String,
    pub caller: String,
    pub model: Option<String>,
}

#[derive(Debug)]
pub enum SemanticLookup {
    Hit {
        response: CachedResponse,
        similarity: f32,
    },
    /// Carries the query embedding when one was produced so indexing can reuse it
    Miss { embedding: Option<Vec<f32>> },
    Skipped,
}

pub struct SemanticCacheService {
    index: Arc<dyn VectorIndex>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ResponseStore>,
    estimator: AdaptiveThresholdEstimator,
    config: SemanticCacheConfig,
}

impl fmt::Debug for SemanticCacheService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticCacheService")
            .field("index", &self.index.backend_name())
            .field("embedding_provider", &self.embedding_provider.provider_name())
            .field("store", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

impl SemanticCacheService {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn ResponseStore>,
        config: SemanticCacheConfig,
    ) -> Self {
        Self {
            estimator: AdaptiveThresholdEstimator::new(&config),
            index,
            embedding_provider,
            store,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &SemanticCacheConfig {
        &self.config
    }

    pub async fn caller_snapshot(&self, caller: &str) -> Option<CallerSnapshot> {
        self.estimator.snapshot(caller).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let request = EmbeddingRequest::new(&self.config.embedding_model, text);
        let response = tokio::time::timeout(
            self.config.embedding_timeout(),
            self.embedding_provider.embed(request),
        )
        .await
        .map_err(|_| {
            DomainError::embedding_unavailable(format!(
                "embedding timed out after {}ms",
                self.config.embedding_timeout_ms
            ))
        })??;

        Ok(response.into_vector())
    }

    async fn nearest(&self, embedding: &[f32]) -> Result<Vec<SimilarityMatch>, DomainError> {
        tokio::time::timeout(
            self.config.query_timeout(),
            self.index.query(embedding.to_vec(), self.config.top_k),
        )
        .await
        .map_err(|_| {
            DomainError::index_unavailable(format!(
                "vector query timed out after {}ms",
                self.config.query_timeout_ms
            ))
        })?
    }

    fn order_candidates(&self, mut candidates: Vec<SimilarityMatch>) -> Vec<SimilarityMatch> {
        if self.config.randomize_selection {
            candidates.shuffle(&mut rand::thread_rng());
        } else {
            candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        }
        candidates
    }

    #[instrument(skip(self, query), fields(caller = %query.caller))]
    pub async fn lookup(&self, query: &SemanticQuery) -> SemanticLookup {
        if !self.config.enabled || query.text.trim().is_empty() {
            return SemanticLookup::Skipped;
        }

        let embedding = match self.embed(&query.text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(error = %e, "Semantic lookup skipped: embedding unavailable");
                record_cache_lookup(CacheTier::Semantic, LookupOutcome::Error);
                return SemanticLookup::Skipped;
            }
        };

        let matches = match self.nearest(&embedding).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Vector index unavailable, treating as no matches");
                record_cache_lookup(CacheTier::Semantic, LookupOutcome::Error);
                Vec::new()
            }
        };

        if matches.is_empty() {
            record_cache_lookup(CacheTier::Semantic, LookupOutcome::Miss);
            return SemanticLookup::Miss {
                embedding: Some(embedding),
            };
        }

        // Every score the index returned feeds the caller's window, even for
        // entries another model produced.
        let (threshold, above) = self.estimator.classify(&query.caller, matches).await;
        let above: Vec<SimilarityMatch> = above
            .into_iter()
            .filter(|m| m.is_compatible_with_model(query.model.as_deref()))
            .collect();
        debug!(
            threshold,
            candidates = above.len(),
            "Classified semantic matches"
        );

        for candidate in self.order_candidates(above) {
            record_similarity(candidate.score, threshold);

            match self.store.get(&candidate.cache_key).await {
                Ok(Some(response)) => {
                    debug!(
                        similarity = candidate.score,
                        key = %candidate.cache_key,
                        "Semantic cache hit"
                    );
                    record_cache_lookup(CacheTier::Semantic, LookupOutcome::Hit);
                    return SemanticLookup::Hit {
                        response,
                        similarity: candidate.score,
                    };
                }
                Ok(None) => {
                    debug!(key = %candidate.cache_key, "Indexed key has no stored response");
                }
                Err(e) => {
                    warn!(error = %e, key = %candidate.cache_key, "Failed to resolve semantic match");
                }
            }
        }

        record_cache_lookup(CacheTier::Semantic, LookupOutcome::Miss);
        SemanticLookup::Miss {
            embedding: Some(embedding),
        }
    }

    /// Makes `key` findable by meaning. Embeds the text unless an embedding is supplied.
    pub async fn index(
        &self,
        key: &CacheKey,
        query: &SemanticQuery,
        embedding: Option<Vec<f32>>,
    ) -> Result<(), DomainError> {
        if query.text.trim().is_empty() {
            return Ok(());
        }

        let embedding = match embedding {
            Some(embedding) => embedding,
            None => self.embed(&query.text).await?,
        };

        let metadata = EmbeddingMetadata::new(key.clone(), query.caller.clone())
            .with_model(query.model.clone());

        tokio::time::timeout(
            self.config.query_timeout(),
            self.index.upsert(key, embedding, metadata),
        )
        .await
        .map_err(|_| DomainError::index_unavailable("vector upsert timed out"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{MockResponseStore, ResponseMetadata};
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::semantic_cache::MockVectorIndex;
    use crate::infrastructure::vector_index::{InMemoryVectorIndex, UnconfiguredVectorIndex};
    use bytes::Bytes;
    use std::time::Duration;

    fn query(text: &str) -> SemanticQuery {
        SemanticQuery {
            text: text.to_string(),
            caller: "sk-abcde".to_string(),
            model: None,
        }
    }

    fn cached(key: &str, body: &'static str) -> CachedResponse {
        CachedResponse::new(CacheKey::new(key), Bytes::from(body), ResponseMetadata::default())
    }

    fn config() -> SemanticCacheConfig {
        SemanticCacheConfig::default().with_randomize_selection(false)
    }

    #[tokio::test]
    async fn test_hit_above_default_threshold() {
        let embeddings = MockEmbeddingProvider::new(3)
            .with_vector("capital of France", vec![1.0, 0.0, 0.0])
            .with_vector("France's capital city", vec![0.99, 0.1, 0.0]);
        let index = Arc::new(InMemoryVectorIndex::default());
        let store = Arc::new(MockResponseStore::new().with_entry(cached("paris", "Paris")));
        let service = SemanticCacheService::new(index, Arc::new(embeddings), store, config());

        service
            .index(&CacheKey::new("paris"), &query("capital of France"), None)
            .await
            .unwrap();

        match service.lookup(&query("France's capital city")).await {
            SemanticLookup::Hit { response, similarity } => {
                assert_eq!(response.body(), &Bytes::from("Paris"));
                assert!(similarity > 0.9);
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_below_threshold_is_miss_with_embedding() {
        let embeddings = MockEmbeddingProvider::new(2)
            .with_vector("a", vec![1.0, 0.0])
            .with_vector("b", vec![0.6, 0.8]);
        let index = Arc::new(InMemoryVectorIndex::default());
        let store = Arc::new(MockResponseStore::new().with_entry(cached("ka", "A")));
        let service = SemanticCacheService::new(index, Arc::new(embeddings), store, config());

        service.index(&CacheKey::new("ka"), &query("a"), None).await.unwrap();

        match service.lookup(&query("b")).await {
            SemanticLookup::Miss { embedding } => assert_eq!(embedding, Some(vec![0.6, 0.8])),
            other => panic!("expected miss, got {:?}", other),
        }
        let snapshot = service.caller_snapshot("sk-abcde").await.unwrap();
        assert_eq!(snapshot.window_len, 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_skips() {
        let service = SemanticCacheService::new(
            Arc::new(InMemoryVectorIndex::default()),
            Arc::new(MockEmbeddingProvider::new(3).with_error("503")),
            Arc::new(MockResponseStore::new()),
            config(),
        );

        assert!(matches!(service.lookup(&query("x")).await, SemanticLookup::Skipped));
    }

    #[tokio::test]
    async fn test_embedding_timeout_skips() {
        let service = SemanticCacheService::new(
            Arc::new(InMemoryVectorIndex::default()),
            Arc::new(MockEmbeddingProvider::new(3).with_delay(Duration::from_millis(200))),
            Arc::new(MockResponseStore::new()),
            config().with_embedding_timeout(Duration::from_millis(20)),
        );

        assert!(matches!(service.lookup(&query("x")).await, SemanticLookup::Skipped));
    }

    #[tokio::test]
    async fn test_unavailable_index_is_miss() {
        let service = SemanticCacheService::new(
            Arc::new(UnconfiguredVectorIndex),
            Arc::new(MockEmbeddingProvider::new(3)),
            Arc::new(MockResponseStore::new()),
            config(),
        );

        assert!(matches!(
            service.lookup(&query("x")).await,
            SemanticLookup::Miss { .. }
        ));
        assert!(service.caller_snapshot("sk-abcde").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_or_empty_text_skips() {
        let service = SemanticCacheService::new(
            Arc::new(InMemoryVectorIndex::default()),
            Arc::new(MockEmbeddingProvider::new(3)),
            Arc::new(MockResponseStore::new()),
            config().with_enabled(false),
        );
        assert!(matches!(service.lookup(&query("x")).await, SemanticLookup::Skipped));

        let embeddings = Arc::new(MockEmbeddingProvider::new(3));
        let service = SemanticCacheService::new(
            Arc::new(InMemoryVectorIndex::default()),
            embeddings.clone(),
            Arc::new(MockResponseStore::new()),
            config(),
        );
        assert!(matches!(service.lookup(&query("  ")).await, SemanticLookup::Skipped));
        assert!(embeddings.calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_scoping_discards_other_models() {
        let mut index = MockVectorIndex::new();
        index.expect_query().returning(|_, _| {
            let metadata = EmbeddingMetadata::new(CacheKey::new("k"), "c")
                .with_model(Some("mistral".to_string()));
            Ok(vec![SimilarityMatch::new(CacheKey::new("k"), 0.99).with_metadata(metadata)])
        });
        let service = SemanticCacheService::new(
            Arc::new(index),
            Arc::new(MockEmbeddingProvider::new(3)),
            Arc::new(MockResponseStore::new().with_entry(cached("k", "cached"))),
            config(),
        );

        let mut scoped = query("x");
        scoped.model = Some("openai".to_string());

        assert!(matches!(service.lookup(&scoped).await, SemanticLookup::Miss { .. }));
    }

    #[tokio::test]
    async fn test_other_model_scores_still_feed_the_window() {
        let mut index = MockVectorIndex::new();
        index.expect_query().returning(|_, _| {
            let foreign = EmbeddingMetadata::new(CacheKey::new("foreign"), "c")
                .with_model(Some("mistral".to_string()));
            let own = EmbeddingMetadata::new(CacheKey::new("own"), "c")
                .with_model(Some("openai".to_string()));
            Ok(vec![
                SimilarityMatch::new(CacheKey::new("foreign"), 0.99).with_metadata(foreign),
                SimilarityMatch::new(CacheKey::new("own"), 0.95).with_metadata(own),
            ])
        });
        let service = SemanticCacheService::new(
            Arc::new(index),
            Arc::new(MockEmbeddingProvider::new(3)),
            Arc::new(
                MockResponseStore::new()
                    .with_entry(cached("foreign", "other model"))
                    .with_entry(cached("own", "same model")),
            ),
            config(),
        );

        let mut scoped = query("x");
        scoped.model = Some("openai".to_string());

        match service.lookup(&scoped).await {
            SemanticLookup::Hit { response, .. } => assert_eq!(response.key().as_str(), "own"),
            other => panic!("expected hit, got {:?}", other),
        }
        let snapshot = service.caller_snapshot("sk-abcde").await.unwrap();
        assert_eq!(snapshot.window_len, 2);
    }

    #[tokio::test]
    async fn test_randomized_selection_serves_every_qualifying_candidate() {
        let mut index = MockVectorIndex::new();
        index.expect_query().returning(|_, _| {
            Ok(vec![
                SimilarityMatch::new(CacheKey::new("first"), 0.95),
                SimilarityMatch::new(CacheKey::new("second"), 0.95),
            ])
        });
        let service = SemanticCacheService::new(
            Arc::new(index),
            Arc::new(MockEmbeddingProvider::new(3)),
            Arc::new(
                MockResponseStore::new()
                    .with_entry(cached("first", "one"))
                    .with_entry(cached("second", "two")),
            ),
            config().with_randomize_selection(true),
        );

        let mut served = std::collections::BTreeSet::new();
        for _ in 0..64 {
            match service.lookup(&query("x")).await {
                SemanticLookup::Hit { response, .. } => {
                    served.insert(response.key().as_str().to_string());
                }
                other => panic!("expected hit, got {:?}", other),
            }
        }

        assert_eq!(
            served.into_iter().collect::<Vec<_>>(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test]
    async fn test_stale_match_falls_through_to_next_candidate() {
        let mut index = MockVectorIndex::new();
        index.expect_query().times(1).returning(|_, _| {
            Ok(vec![
                SimilarityMatch::new(CacheKey::new("gone"), 0.99),
                SimilarityMatch::new(CacheKey::new("live"), 0.97),
            ])
        });
        let service = SemanticCacheService::new(
            Arc::new(index),
            Arc::new(MockEmbeddingProvider::new(3)),
            Arc::new(MockResponseStore::new().with_entry(cached("live", "still here"))),
            config(),
        );

        match service.lookup(&query("x")).await {
            SemanticLookup::Hit { response, similarity } => {
                assert_eq!(response.key().as_str(), "live");
                assert!((similarity - 0.97).abs() < 1e-6);
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_index_reuses_supplied_embedding() {
        let mut index = MockVectorIndex::new();
        index
            .expect_upsert()
            .withf(|id, vector, metadata| {
                id.as_str() == "k" && vector == &vec![0.5, 0.5] && metadata.caller_prefix == "sk-abcde"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let embeddings = Arc::new(MockEmbeddingProvider::new(2));
        let service = SemanticCacheService::new(
            Arc::new(index),
            embeddings.clone(),
            Arc::new(MockResponseStore::new()),
            config(),
        );

        service
            .index(&CacheKey::new("k"), &query("x"), Some(vec![0.5, 0.5]))
            .await
            .unwrap();

        assert!(embeddings.calls().is_empty());
    }
}

//! Request routing through the two cache tiers
//!
//! exact lookup -> (semantic lookup) -> origin -> respond -> populate.
//! Population runs on its own task after the response has been handed back, and
//! for streamed bodies only once the origin stream has finished, whether or not
//! the client is still reading.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn};

use crate::domain::cache::{
    CacheKey, CacheKeyGenerator, CacheStatus, CachedResponse, ResponseMetadata, ResponseStore,
};
use crate::domain::proxy::{
    ByteStream, OriginClient, OriginResponse, ProxyRequest, ProxyResponse, ResponseBody,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::{
    record_cache_lookup, record_population, CacheTier, LookupOutcome,
};

use super::semantic_cache_service::{SemanticCacheService, SemanticLookup, SemanticQuery};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_SEMANTIC_SIMILARITY: HeaderName = HeaderName::from_static("x-semantic-similarity");
pub const X_SEMANTIC_CACHE_KEY: HeaderName = HeaderName::from_static("x-semantic-cache-key");

#[async_trait]
pub trait ProxyServiceTrait: Send + Sync + Debug {
    async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse, DomainError>;
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Path prefixes that are always proxied without caching
    pub non_cacheable_paths: Vec<String>,
    pub caller_prefix_len: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            non_cacheable_paths: Vec::new(),
            caller_prefix_len: 8,
        }
    }
}

#[derive(Debug)]
pub struct ProxyService {
    store: Arc<dyn ResponseStore>,
    key_generator: Arc<dyn CacheKeyGenerator>,
    semantic: Arc<SemanticCacheService>,
    origin: Arc<dyn OriginClient>,
    config: ProxyConfig,
}

impl ProxyService {
    pub fn new(
        store: Arc<dyn ResponseStore>,
        key_generator: Arc<dyn CacheKeyGenerator>,
        semantic: Arc<SemanticCacheService>,
        origin: Arc<dyn OriginClient>,
        config: ProxyConfig,
    ) -> Self {
        Self {
            store,
            key_generator,
            semantic,
            origin,
            config,
        }
    }

    fn is_bypassed(&self, request: &ProxyRequest) -> bool {
        request.no_cache()
            || self
                .config
                .non_cacheable_paths
                .iter()
                .any(|prefix| request.path().starts_with(prefix.as_str()))
    }

    async fn passthrough(&self, request: &ProxyRequest) -> Result<ProxyResponse, DomainError> {
        let origin = self.origin.forward(request).await?;
        Ok(from_origin(origin))
    }

    async fn lookup_exact(&self, key: &CacheKey) -> Option<CachedResponse> {
        match self.store.get(key).await {
            Ok(Some(cached)) => {
                record_cache_lookup(CacheTier::Exact, LookupOutcome::Hit);
                Some(cached)
            }
            Ok(None) => {
                record_cache_lookup(CacheTier::Exact, LookupOutcome::Miss);
                None
            }
            Err(e) => {
                warn!(error = %e, key = %key, "Exact store lookup failed, continuing as miss");
                record_cache_lookup(CacheTier::Exact, LookupOutcome::Error);
                None
            }
        }
    }
}

#[async_trait]
impl ProxyServiceTrait for ProxyService {
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = %request.path(), mode = ?request.mode())
    )]
    async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse, DomainError> {
        if self.is_bypassed(&request) {
            debug!("Cache bypassed");
            record_cache_lookup(CacheTier::Exact, LookupOutcome::Bypass);
            return self.passthrough(&request).await;
        }

        let key = match self.key_generator.generate(&request.descriptor()) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Cache key generation failed, proxying without cache");
                return self.passthrough(&request).await;
            }
        };

        let streaming = request.is_streaming();

        if let Some(cached) = self.lookup_exact(&key).await {
            debug!(key = %key, "Exact cache hit");
            return Ok(from_cache(cached, CacheStatus::Hit, None, streaming));
        }

        let mut pending_index = None;
        if request.is_semantic() && self.semantic.is_enabled() {
            let query = SemanticQuery {
                text: request.embedding_text(),
                caller: request.caller_identity(self.config.caller_prefix_len),
                model: request.model(),
            };

            match self.semantic.lookup(&query).await {
                SemanticLookup::Hit {
                    response,
                    similarity,
                } => {
                    return Ok(from_cache(
                        response,
                        CacheStatus::SemanticHit,
                        Some(similarity),
                        streaming,
                    ));
                }
                SemanticLookup::Miss { embedding } => {
                    pending_index = Some(PendingIndex { query, embedding });
                }
                SemanticLookup::Skipped if !query.text.trim().is_empty() => {
                    pending_index = Some(PendingIndex {
                        query,
                        embedding: None,
                    });
                }
                SemanticLookup::Skipped => {}
            }
        }

        let origin = self.origin.forward(&request).await?;

        if !origin.is_cacheable() {
            debug!(status = %origin.status, "Origin response is not cacheable");
            return Ok(from_origin(origin));
        }

        let population = Population {
            key,
            metadata: origin.metadata(),
            store: self.store.clone(),
            index: pending_index.map(|pending| (self.semantic.clone(), pending)),
        };

        let mut response = from_origin(origin);
        response.body = match response.body {
            ResponseBody::Full(bytes) => {
                tokio::spawn(population.run(bytes.clone()));
                ResponseBody::Full(bytes)
            }
            ResponseBody::Stream(stream) => ResponseBody::Stream(tee_stream(stream, population)),
        };

        Ok(response)
    }
}

#[derive(Debug)]
struct PendingIndex {
    query: SemanticQuery,
    embedding: Option<Vec<f32>>,
}

/// Everything needed to write a finished origin response into both tiers
#[derive(Debug)]
struct Population {
    key: CacheKey,
    metadata: ResponseMetadata,
    store: Arc<dyn ResponseStore>,
    index: Option<(Arc<SemanticCacheService>, PendingIndex)>,
}

impl Population {
    async fn run(self, body: Bytes) {
        let response = CachedResponse::new(self.key.clone(), body, self.metadata);

        if let Err(e) = self.store.put(&self.key, response).await {
            warn!(error = %e, key = %self.key, "Failed to store response");
            record_population("store", false);
            return;
        }
        record_population("store", true);
        debug!(key = %self.key, "Stored response");

        if let Some((semantic, pending)) = self.index {
            match semantic
                .index(&self.key, &pending.query, pending.embedding)
                .await
            {
                Ok(()) => record_population("index", true),
                Err(e) => {
                    warn!(error = %e, key = %self.key, "Failed to index response");
                    record_population("index", false);
                }
            }
        }
    }
}

/// Forwards origin chunks to the client while buffering a copy. The reader
/// task owns the origin stream, so it keeps draining it after the client goes
/// away and populates once the stream ends cleanly.
fn tee_stream(mut origin: ByteStream, population: Population) -> ByteStream {
    let (tx, rx) = mpsc::channel::<Result<Bytes, DomainError>>(32);

    tokio::spawn(async move {
        let mut buffer = BytesMut::new();
        let mut client_connected = true;

        while let Some(chunk) = origin.next().await {
            match chunk {
                Ok(bytes) => {
                    buffer.extend_from_slice(&bytes);
                    if client_connected && tx.send(Ok(bytes)).await.is_err() {
                        debug!(key = %population.key, "Client disconnected, still buffering origin stream");
                        client_connected = false;
                    }
                }
                Err(e) => {
                    warn!(error = %e, key = %population.key, "Origin stream failed, not caching");
                    if client_connected {
                        let _ = tx.send(Err(e)).await;
                    }
                    return;
                }
            }
        }

        drop(tx);
        population.run(buffer.freeze()).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

fn from_origin(origin: OriginResponse) -> ProxyResponse {
    let OriginResponse {
        status,
        mut headers,
        body,
    } = origin;
    headers.insert(X_CACHE, HeaderValue::from_static(CacheStatus::Miss.as_header_value()));

    ProxyResponse {
        status,
        headers,
        body,
        cache_status: CacheStatus::Miss,
    }
}

fn from_cache(
    cached: CachedResponse,
    status: CacheStatus,
    similarity: Option<f32>,
    streaming_requested: bool,
) -> ProxyResponse {
    let mut headers = HeaderMap::new();
    let metadata = cached.metadata();

    let mut set = |name: HeaderName, value: &str| {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    };

    set(
        header::CONTENT_TYPE,
        &cached.effective_content_type(streaming_requested),
    );
    if let Some(v) = &metadata.content_encoding {
        set(header::CONTENT_ENCODING, v);
    }
    if let Some(v) = &metadata.content_disposition {
        set(header::CONTENT_DISPOSITION, v);
    }
    if let Some(v) = &metadata.content_language {
        set(header::CONTENT_LANGUAGE, v);
    }
    set(X_CACHE, status.as_header_value());
    if let Some(similarity) = similarity {
        set(X_SEMANTIC_SIMILARITY, &format!("{:.4}", similarity));
        set(X_SEMANTIC_CACHE_KEY, cached.key().as_str());
    }

    ProxyResponse {
        status: StatusCode::OK,
        headers,
        body: ResponseBody::Full(cached.body().clone()),
        cache_status: status,
    }
}

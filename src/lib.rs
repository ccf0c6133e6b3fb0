//! PMP Cache Proxy
//!
//! A caching reverse proxy for a generative text service with:
//! - An exact-match tier keyed by a hash of the canonical request
//! - A semantic tier that matches requests by embedding similarity
//! - A per-caller adaptive similarity threshold
//! - Pluggable response stores (in-memory, Redis) and vector indexes

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::{AppState, ComponentInfo};
use domain::cache::DefaultKeyGenerator;
use domain::embedding::EmbeddingProvider;
use infrastructure::{
    cache::ResponseStoreFactory,
    embedding::OpenAiEmbeddingProvider,
    http_client::HttpClient,
    origin::HttpOriginClient,
    services::{ProxyConfig, ProxyService, SemanticCacheService},
    vector_index::VectorIndexFactory,
};
use tracing::info;

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Wires the store, index, embedding provider and origin client from configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let store = ResponseStoreFactory::new()
        .create(&config.cache.store_config())
        .await?;
    info!(backend = store.backend_name(), "Response store ready");

    let index = VectorIndexFactory::new().create(&config.vector_index)?;
    info!(backend = index.backend_name(), "Vector index ready");

    let embedding_client = HttpClient::with_timeout(config.semantic.embedding_timeout());
    let embedding_provider: Arc<dyn EmbeddingProvider> = match &config.embedding.base_url {
        Some(base_url) => Arc::new(OpenAiEmbeddingProvider::with_base_url(
            embedding_client,
            config.embedding.api_key.clone(),
            base_url.clone(),
        )),
        None => Arc::new(OpenAiEmbeddingProvider::new(
            embedding_client,
            config.embedding.api_key.clone(),
        )),
    };

    let semantic = Arc::new(SemanticCacheService::new(
        index.clone(),
        embedding_provider.clone(),
        store.clone(),
        config.semantic.clone(),
    ));

    let origin = Arc::new(HttpOriginClient::new(&config.origin)?);
    info!(
        base_url = %config.origin.base_url,
        timeout = ?Duration::from_secs(config.origin.timeout_secs),
        "Origin client ready"
    );

    let key_generator = DefaultKeyGenerator::new()
        .with_ignored_params(config.cache.ignored_query_params.iter().cloned());

    let proxy_service = ProxyService::new(
        store.clone(),
        Arc::new(key_generator),
        semantic,
        origin,
        ProxyConfig {
            non_cacheable_paths: config.cache.non_cacheable_paths.clone(),
            caller_prefix_len: config.semantic.caller_prefix_len,
        },
    );

    let components = ComponentInfo {
        store: store.backend_name(),
        vector_index: index.backend_name(),
        embedding: embedding_provider.provider_name(),
        semantic_enabled: config.semantic.enabled,
    };

    Ok(AppState::new(Arc::new(proxy_service), components)
        .with_max_body_bytes(config.server.max_body_bytes))
}

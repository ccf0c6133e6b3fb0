//! Infrastructure services

mod proxy_service;
mod semantic_cache_service;

pub use proxy_service::{
    ProxyConfig, ProxyService, ProxyServiceTrait, X_CACHE, X_SEMANTIC_CACHE_KEY,
    X_SEMANTIC_SIMILARITY,
};
pub use semantic_cache_service::{SemanticCacheService, SemanticLookup, SemanticQuery};

//! Application state for shared services

use std::sync::Arc;

use serde::Serialize;

use crate::infrastructure::services::ProxyServiceTrait;

/// Backends the proxy was wired with, reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    pub store: &'static str,
    pub vector_index: &'static str,
    pub embedding: &'static str,
    pub semantic_enabled: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub proxy_service: Arc<dyn ProxyServiceTrait>,
    pub components: ComponentInfo,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(proxy_service: Arc<dyn ProxyServiceTrait>, components: ComponentInfo) -> Self {
        Self {
            proxy_service,
            components,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

//! Vector index factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::semantic_cache::VectorIndex;
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClient;

use super::{HttpVectorIndex, InMemoryVectorIndex, UnconfiguredVectorIndex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorIndexType {
    #[default]
    None,
    InMemory,
    Http,
}

impl std::fmt::Display for VectorIndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorIndexType::None => write!(f, "none"),
            VectorIndexType::InMemory => write!(f, "in_memory"),
            VectorIndexType::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for VectorIndexType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "disabled" | "" => Ok(VectorIndexType::None),
            "in_memory" | "inmemory" | "memory" => Ok(VectorIndexType::InMemory),
            "http" | "vectorize" => Ok(VectorIndexType::Http),
            _ => Err(DomainError::configuration(format!(
                "Unknown vector index backend: {}. Valid backends: none, in_memory, http",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    #[serde(default)]
    pub backend: VectorIndexType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Per-request deadline for the HTTP backend
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_entries() -> usize {
    100_000
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            backend: VectorIndexType::None,
            url: None,
            api_key: None,
            max_entries: default_max_entries(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl VectorIndexConfig {
    pub fn in_memory() -> Self {
        Self {
            backend: VectorIndexType::InMemory,
            ..Default::default()
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self {
            backend: VectorIndexType::Http,
            url: Some(url.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct VectorIndexFactory;

impl VectorIndexFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, config: &VectorIndexConfig) -> Result<Arc<dyn VectorIndex>, DomainError> {
        match config.backend {
            VectorIndexType::None => Ok(Arc::new(UnconfiguredVectorIndex)),
            VectorIndexType::InMemory => Ok(Arc::new(InMemoryVectorIndex::new(config.max_entries))),
            VectorIndexType::Http => {
                let Some(url) = config.url.clone().filter(|u| !u.is_empty()) else {
                    warn!("vector_index.url is not set for the http backend, semantic tier disabled");
                    return Ok(Arc::new(UnconfiguredVectorIndex));
                };

                let client = HttpClient::with_timeout(Duration::from_millis(config.timeout_ms));
                Ok(Arc::new(HttpVectorIndex::new(client, url, config.api_key.clone())))
            }
        }
    }
}

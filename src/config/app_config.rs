use std::time::Duration;

use serde::Deserialize;

use crate::domain::semantic_cache::SemanticCacheConfig;
use crate::infrastructure::cache::{StoreConfig, StoreType};
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::origin::OriginConfig;
use crate::infrastructure::vector_index::VectorIndexConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub semantic: SemanticCacheConfig,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest request body the proxy will buffer
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Exact-match tier settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub key_prefix: Option<String>,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Entries never expire when unset
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Query parameters left out of the cache key
    #[serde(default = "default_ignored_query_params")]
    pub ignored_query_params: Vec<String>,
    /// Path prefixes that always go straight to the origin
    #[serde(default)]
    pub non_cacheable_paths: Vec<String>,
}

fn default_backend() -> String {
    "in_memory".to_string()
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_ignored_query_params() -> Vec<String> {
    vec!["no-cache".to_string(), "token".to_string()]
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis_url: None,
            key_prefix: None,
            max_capacity: default_max_capacity(),
            ttl_secs: None,
            ignored_query_params: default_ignored_query_params(),
            non_cacheable_paths: Vec::new(),
        }
    }
}

impl CacheSettings {
    /// Unknown backend names fall back to the in-memory store
    pub fn store_config(&self) -> StoreConfig {
        let store_type = self.backend.parse::<StoreType>().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to in-memory cache backend");
            StoreType::InMemory
        });

        StoreConfig {
            store_type,
            redis_url: self.redis_url.clone(),
            key_prefix: self.key_prefix.clone(),
            max_capacity: self.max_capacity,
            ttl: self.ttl_secs.map(Duration::from_secs),
        }
    }
}

/// Embedding API settings. The model itself lives in the semantic section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Defaults to the public OpenAI endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cache.ignored_query_params")
                    .with_list_parse_key("cache.non_cacheable_paths")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

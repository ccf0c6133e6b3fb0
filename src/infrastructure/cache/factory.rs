//! Response store factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use crate::domain::cache::ResponseStore;
use crate::domain::DomainError;

use super::in_memory::InMemoryResponseStore;
use super::redis::{RedisResponseStore, RedisStoreConfig};

/// Supported store backends
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StoreType {
    #[default]
    InMemory,
    Redis,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::InMemory => write!(f, "in_memory"),
            StoreType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(StoreType::InMemory),
            "redis" => Ok(StoreType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache backend: {}. Valid backends: in_memory, redis",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub store_type: StoreType,
    /// Required for Redis
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    /// In-memory only
    pub max_capacity: u64,
    pub ttl: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::InMemory,
            redis_url: None,
            key_prefix: None,
            max_capacity: 10_000,
            ttl: None,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            store_type: StoreType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Default)]
pub struct ResponseStoreFactory;

impl ResponseStoreFactory {
    pub fn new() -> Self {
        Self
    }

    pub async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ResponseStore>, DomainError> {
        match config.store_type {
            StoreType::InMemory => {
                let store = match config.ttl {
                    Some(ttl) => InMemoryResponseStore::with_time_to_live(config.max_capacity, ttl),
                    None => InMemoryResponseStore::new(config.max_capacity),
                };
                Ok(Arc::new(store))
            }
            StoreType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for the redis cache backend")
                })?;

                let mut redis_config = RedisStoreConfig::new(url);
                if let Some(prefix) = &config.key_prefix {
                    redis_config = redis_config.with_key_prefix(prefix.clone());
                }
                if let Some(ttl) = config.ttl {
                    redis_config = redis_config.with_ttl(ttl);
                }

                Ok(Arc::new(RedisResponseStore::new(redis_config).await?))
            }
        }
    }
}

//! In-memory response store using moka

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::{CacheKey, CachedResponse, ResponseStore};
use crate::domain::DomainError;

/// Process-local store. Entries are whole `CachedResponse` values, so a
/// reader always sees one complete write.
#[derive(Debug)]
pub struct InMemoryResponseStore {
    cache: MokaCache<CacheKey, CachedResponse>,
}

impl InMemoryResponseStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: MokaCache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Adds a retention period on top of the capacity bound
    pub fn with_time_to_live(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: MokaCache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for InMemoryResponseStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl ResponseStore for InMemoryResponseStore {
    async fn put(&self, key: &CacheKey, response: CachedResponse) -> Result<(), DomainError> {
        self.cache.insert(key.clone(), response).await;
        Ok(())
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, DomainError> {
        Ok(self.cache.get(key).await)
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}

//! Exact-match response store trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::{CacheKey, CachedResponse};
use crate::domain::DomainError;

/// Key → response blob store.
///
/// `put` must be atomic: a concurrent `get` observes either the previous
/// complete entry or the new one, never a mix.
#[async_trait]
pub trait ResponseStore: Send + Sync + Debug {
    async fn put(&self, key: &CacheKey, response: CachedResponse) -> Result<(), DomainError>;

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, DomainError>;

    fn backend_name(&self) -> &'static str;
}

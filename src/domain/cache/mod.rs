//! Cache domain - exact-match tier

mod entry;
mod key;
mod repository;

pub use entry::{sniff_content_type, CacheStatus, CachedResponse, ResponseMetadata};
pub use key::{normalize_path, CacheKey, CacheKeyGenerator, DefaultKeyGenerator, RequestDescriptor};
pub use repository::ResponseStore;

#[cfg(test)]
pub use repository::mock::MockResponseStore;

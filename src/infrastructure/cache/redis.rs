//! Redis response store

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};

use crate::domain::cache::{CacheKey, CachedResponse, ResponseMetadata, ResponseStore};
use crate::domain::DomainError;

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Expiry applied on write; `None` leaves retention to the server policy
    pub ttl: Option<Duration>,
}

impl RedisStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: None,
            ttl: None,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// One document per key, written with a single SET so readers never see a partial entry
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    key: CacheKey,
    body: String,
    #[serde(default)]
    metadata: ResponseMetadata,
    created_at: DateTime<Utc>,
}

impl StoredDocument {
    fn encode(response: &CachedResponse) -> Result<String, DomainError> {
        let document = Self {
            key: response.key().clone(),
            body: BASE64.encode(response.body()),
            metadata: response.metadata().clone(),
            created_at: response.created_at(),
        };

        serde_json::to_string(&document)
            .map_err(|e| DomainError::storage(format!("Failed to serialize response: {}", e)))
    }

    fn decode(raw: &str) -> Result<CachedResponse, DomainError> {
        let document: Self = serde_json::from_str(raw)
            .map_err(|e| DomainError::storage(format!("Corrupt cache document: {}", e)))?;

        let body = BASE64
            .decode(document.body.as_bytes())
            .map_err(|e| DomainError::storage(format!("Corrupt cache body: {}", e)))?;

        Ok(CachedResponse::restore(
            document.key,
            Bytes::from(body),
            document.metadata,
            document.created_at,
        ))
    }
}

#[derive(Clone)]
pub struct RedisResponseStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisResponseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisResponseStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisResponseStore {
    pub async fn new(config: RedisStoreConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::storage(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    fn prefix_key(&self, key: &CacheKey) -> String {
        prefixed(self.config.key_prefix.as_deref(), key)
    }
}

fn prefixed(prefix: Option<&str>, key: &CacheKey) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, key),
        None => key.to_string(),
    }
}

#[async_trait]
impl ResponseStore for RedisResponseStore {
    async fn put(&self, key: &CacheKey, response: CachedResponse) -> Result<(), DomainError> {
        let document = StoredDocument::encode(&response)?;
        let redis_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: redis::RedisResult<()> = match self.config.ttl {
            Some(ttl) => conn.set_ex(&redis_key, document, ttl.as_secs().max(1)).await,
            None => conn.set(&redis_key, document).await,
        };

        result.map_err(|e| DomainError::storage(format!("Failed to store key '{}': {}", key, e)))
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, DomainError> {
        let redis_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let raw: Option<String> = conn
            .get(&redis_key)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get key '{}': {}", key, e)))?;

        raw.as_deref().map(StoredDocument::decode).transpose()
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_round_trip_preserves_binary_body() {
        let body = Bytes::from_static(&[0x1f, 0x8b, 0x00, 0xff, b'{']);
        let response = CachedResponse::new(
            CacheKey::new("k1"),
            body.clone(),
            ResponseMetadata::default().with_content_encoding("gzip"),
        );

        let raw = StoredDocument::encode(&response).unwrap();
        let decoded = StoredDocument::decode(&raw).unwrap();

        assert_eq!(decoded, response);
        assert_eq!(decoded.body(), &body);
    }

    #[test]
    fn test_document_without_metadata_decodes() {
        let raw = r#"{"key":"k","body":"aGVsbG8=","created_at":"2024-01-01T00:00:00Z"}"#;
        let decoded = StoredDocument::decode(raw).unwrap();

        assert_eq!(decoded.body(), &Bytes::from("hello"));
        assert!(decoded.metadata().content_type.is_none());
        assert_eq!(decoded.effective_content_type(false), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_corrupt_document_is_storage_error() {
        let result = StoredDocument::decode("not json");
        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }

    #[test]
    fn test_key_prefix() {
        let key = CacheKey::new("abc");
        assert_eq!(prefixed(Some("proxy"), &key), "proxy:abc");
        assert_eq!(prefixed(None, &key), "abc");
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_put_get() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let store = RedisResponseStore::new(RedisStoreConfig::new(url).with_key_prefix("test"))
            .await
            .unwrap();
        let key = CacheKey::new("redis-round-trip");
        let response = CachedResponse::new(key.clone(), Bytes::from("hi"), ResponseMetadata::default());

        store.put(&key, response.clone()).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(response));
    }
}

//! Cached response entity

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CacheKey;

/// HTTP metadata stored alongside a cached body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
}

impl ResponseMetadata {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }
}

/// An immutable response body plus metadata, addressed by its cache key
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    key: CacheKey,
    body: Bytes,
    metadata: ResponseMetadata,
    created_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(key: CacheKey, body: Bytes, metadata: ResponseMetadata) -> Self {
        Self {
            key,
            body,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Rebuilds an entry read back from a store
    pub fn restore(
        key: CacheKey,
        body: Bytes,
        metadata: ResponseMetadata,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            body,
            metadata,
            created_at,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Stored content type, or one inferred from the body when it was never recorded.
    pub fn effective_content_type(&self, streaming_requested: bool) -> String {
        match &self.metadata.content_type {
            Some(ct) => ct.clone(),
            None => sniff_content_type(&self.body, streaming_requested).to_string(),
        }
    }
}

pub fn sniff_content_type(body: &[u8], streaming_requested: bool) -> &'static str {
    match body.first() {
        Some(b'{') | Some(b'[') => "application/json",
        _ if streaming_requested => "text/event-stream",
        _ => "text/plain; charset=utf-8",
    }
}

/// How a response was served, reported in the `x-cache` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    SemanticHit,
}

impl CacheStatus {
    pub fn as_header_value(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::SemanticHit => "SEMANTIC-HIT",
        }
    }
}

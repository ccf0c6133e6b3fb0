//! Cache key generation

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Display};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::DomainError;

/// Opaque, deterministic identifier of a logical request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The parts of a request that determine its cache identity
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }
}

/// Trait for deriving cache keys from request descriptors
pub trait CacheKeyGenerator: Send + Sync + Debug {
    fn generate(&self, descriptor: &RequestDescriptor) -> Result<CacheKey, DomainError>;
}

/// SHA-256 over a canonical serialization of method, path, query and body
#[derive(Debug, Clone, Default)]
pub struct DefaultKeyGenerator {
    ignored_params: BTreeSet<String>,
}

impl DefaultKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query parameters that never contribute to the key (e.g. `no-cache`, `token`)
    pub fn with_ignored_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Pairs arrive decoded, so `&` and `=` may appear inside values; a JSON
    /// array keeps `a=b%26c` and `a=b&c` apart.
    fn canonical_query(&self, query: &[(String, String)]) -> Result<String, DomainError> {
        let mut pairs: Vec<&(String, String)> = query
            .iter()
            .filter(|(k, _)| !self.ignored_params.contains(k))
            .collect();
        pairs.sort();

        serde_json::to_string(&pairs)
            .map_err(|e| DomainError::key_generation(format!("failed to serialize query: {}", e)))
    }

    fn canonical_body(method: &str, body: Option<&Bytes>) -> Result<String, DomainError> {
        let body = match body {
            Some(b) if !b.is_empty() && carries_body(method) => b,
            _ => return Ok(String::new()),
        };

        let value: Value = serde_json::from_slice(body).map_err(|e| {
            DomainError::key_generation(format!("request body is not valid JSON: {}", e))
        })?;

        serde_json::to_string(&canonicalize(value))
            .map_err(|e| DomainError::key_generation(format!("failed to serialize body: {}", e)))
    }
}

impl CacheKeyGenerator for DefaultKeyGenerator {
    fn generate(&self, descriptor: &RequestDescriptor) -> Result<CacheKey, DomainError> {
        let method = descriptor.method.to_ascii_uppercase();
        let body = Self::canonical_body(&method, descriptor.body.as_ref())?;
        let query = self.canonical_query(&descriptor.query)?;

        let canonical = [
            method.as_str(),
            normalize_path(&descriptor.path).as_str(),
            query.as_str(),
            body.as_str(),
        ]
        .join("\n");

        let digest = Sha256::digest(canonical.as_bytes());
        Ok(CacheKey(hex::encode(digest)))
    }
}

/// Collapses empty segments so `//a/b/` and `/a/b` are the same path.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn carries_body(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "PATCH")
}

/// Rebuilds objects in sorted key order, recursively.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

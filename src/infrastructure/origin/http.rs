//! reqwest-backed origin client

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::proxy::{OriginClient, OriginResponse, ProxyRequest, ResponseBody};
use crate::domain::DomainError;

/// Connection-scoped headers that must not be relayed in either direction
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Deadline for the origin to start answering
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl OriginConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpOriginClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpOriginClient {
    pub fn new(config: &OriginConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build origin client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Test hook for sub-second deadlines
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url_for(&self, request: &ProxyRequest) -> String {
        format!("{}{}", self.base_url, request.forward_uri())
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn outbound_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming {
        if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn relayed_headers(origin: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(origin.len());
    for (name, value) in origin {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/event-stream"))
}

#[async_trait]
impl OriginClient for HttpOriginClient {
    #[instrument(skip(self, request), fields(method = %request.method(), uri = %request.forward_uri()))]
    async fn forward(&self, request: &ProxyRequest) -> Result<OriginResponse, DomainError> {
        let url = self.url_for(request);

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(outbound_headers(request.headers()));
        if !request.body().is_empty() {
            builder = builder.body(request.body().clone());
        }

        let response = match tokio::time::timeout(self.timeout, builder.send()).await {
            Err(_) => {
                return Err(DomainError::upstream_timeout(format!(
                    "Origin did not respond within {:?}",
                    self.timeout
                )));
            }
            Ok(Err(e)) if e.is_timeout() => {
                return Err(DomainError::upstream_timeout(format!("Origin timed out: {}", e)));
            }
            Ok(Err(e)) => {
                return Err(DomainError::upstream(format!("Request to origin failed: {}", e)));
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        let headers = relayed_headers(response.headers());
        debug!(status = %status, "Origin responded");

        let body = if is_event_stream(&headers) {
            let stream = response.bytes_stream().map(|chunk| {
                chunk.map_err(|e| DomainError::upstream(format!("Origin stream error: {}", e)))
            });
            ResponseBody::Stream(Box::pin(stream))
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| DomainError::upstream(format!("Failed to read origin body: {}", e)))?;
            ResponseBody::Full(bytes)
        };

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}

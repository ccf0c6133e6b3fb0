//! Origin service collaborator

use std::fmt::Debug;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};

use super::{ProxyRequest, ResponseBody};
use crate::domain::cache::ResponseMetadata;
use crate::domain::DomainError;

/// Response received from the origin service
#[derive(Debug)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl OriginResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// 200 responses with a textual, JSON or event-stream body
    pub fn is_cacheable(&self) -> bool {
        if self.status != StatusCode::OK {
            return false;
        }

        match self.content_type() {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.starts_with("text/") || ct.starts_with("application/json")
            }
            None => false,
        }
    }

    /// HTTP metadata worth persisting with the body
    pub fn metadata(&self) -> ResponseMetadata {
        let get = |name: header::HeaderName| {
            self.headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        ResponseMetadata {
            content_type: get(header::CONTENT_TYPE),
            content_encoding: get(header::CONTENT_ENCODING),
            content_disposition: get(header::CONTENT_DISPOSITION),
            content_language: get(header::CONTENT_LANGUAGE),
        }
    }
}

/// Forwards requests to the origin generation service
#[async_trait]
pub trait OriginClient: Send + Sync + Debug {
    async fn forward(&self, request: &ProxyRequest) -> Result<OriginResponse, DomainError>;
}

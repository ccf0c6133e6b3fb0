//! Request logging with credential redaction and cache outcome

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::infrastructure::services::X_CACHE;

/// Logs one line when a request arrives and one when its response headers are
/// ready. `TraceLayer` owns the span, so none is opened here.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = extract_path(&request);
    let request_id = extract_request_id(request.headers());
    let headers_log = redact_headers(request.headers());

    info!(
        method = %method,
        path = %path,
        uri = %request.uri(),
        request_id = %request_id,
        headers = %headers_log,
        "Incoming request"
    );

    let response = next.run(request).await;

    let cache = response
        .headers()
        .get(X_CACHE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        cache = %cache,
        duration_ms = %start.elapsed().as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}

pub(crate) fn extract_path(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn redact_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| should_log_header(name.as_str()))
        .map(|(name, value)| {
            let value = if is_sensitive_header(name.as_str()) {
                "[REDACTED]"
            } else {
                value.to_str().unwrap_or("[invalid]")
            };
            format!("{}={}", name, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_sensitive_header(name: &str) -> bool {
    matches!(
        name,
        "authorization" | "x-api-key" | "cookie" | "proxy-authorization"
    )
}

fn should_log_header(name: &str) -> bool {
    matches!(
        name,
        "content-type"
            | "content-length"
            | "accept"
            | "user-agent"
            | "cache-control"
            | "x-request-id"
            | "x-forwarded-for"
            | "authorization"
            | "x-api-key"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_credentials_are_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-secret"));
        headers.insert("x-api-key", HeaderValue::from_static("abc123"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("etag", HeaderValue::from_static("\"v1\""));

        let logged = redact_headers(&headers);

        assert!(logged.contains("authorization=[REDACTED]"));
        assert!(logged.contains("x-api-key=[REDACTED]"));
        assert!(logged.contains("content-type=application/json"));
        assert!(!logged.contains("sk-secret"));
        assert!(!logged.contains("etag"));
    }

    #[test]
    fn test_request_id_is_reused_or_generated() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_request_id(&headers).len(), 36);

        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        assert_eq!(extract_request_id(&headers), "req-1");
    }
}

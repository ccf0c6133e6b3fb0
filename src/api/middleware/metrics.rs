//! HTTP request metrics

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use super::logging::extract_path;
use crate::infrastructure::observability::record_http_request;

/// Records count and latency per matched route, so proxied paths collapse
/// into `/{*path}` and `/semantic/{*path}`.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = extract_path(&request);

    let response = next.run(request).await;

    record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}

//! Catch-all proxy handlers
//!
//! `/{*path}` runs the exact tier only. `/semantic/{*path}` adds the semantic
//! tier and is forwarded to the origin with the `/semantic` prefix removed.

use axum::{
    body::Body,
    extract::{Query, Request, State},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use tracing::warn;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::proxy::{LookupMode, ProxyRequest, ProxyResponse, ResponseBody};

const SEMANTIC_PREFIX: &str = "/semantic";

pub async fn proxy_exact(
    State(state): State<AppState>,
    Query(query): Query<Vec<(String, String)>>,
    request: Request,
) -> Result<Response, ApiError> {
    forward(state, query, request, LookupMode::Exact).await
}

pub async fn proxy_semantic(
    State(state): State<AppState>,
    Query(query): Query<Vec<(String, String)>>,
    request: Request,
) -> Result<Response, ApiError> {
    forward(state, query, request, LookupMode::Semantic).await
}

async fn forward(
    state: AppState,
    query: Vec<(String, String)>,
    request: Request,
    mode: LookupMode,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let raw_path = match mode {
        LookupMode::Exact => parts.uri.path().to_string(),
        LookupMode::Semantic => strip_semantic_prefix(parts.uri.path()),
    };
    let forward_uri = match parts.uri.query() {
        Some(raw) => format!("{}?{}", raw_path, raw),
        None => raw_path.clone(),
    };
    let path = decode_path(&raw_path);

    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| {
            warn!(error = %e, limit = state.max_body_bytes, "Rejected request body");
            ApiError::payload_too_large(format!(
                "Request body could not be read within {} bytes",
                state.max_body_bytes
            ))
        })?;

    let proxy_request = ProxyRequest::new(parts.method, path, forward_uri)
        .with_query(query)
        .with_headers(parts.headers)
        .with_body(body)
        .with_mode(mode);

    let response = state.proxy_service.handle(proxy_request).await?;
    Ok(into_http_response(response))
}

/// `/semantic` becomes `/`, `/semantic/a/b` becomes `/a/b`
fn strip_semantic_prefix(path: &str) -> String {
    match path.strip_prefix(SEMANTIC_PREFIX) {
        Some(rest) if rest.is_empty() => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}

/// Logical path for keying and embedding; the origin still gets the raw form.
fn decode_path(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn into_http_response(response: ProxyResponse) -> Response {
    let body = match response.body {
        ResponseBody::Full(bytes) => Body::from(bytes),
        ResponseBody::Stream(stream) => Body::from_stream(stream),
    };

    let mut http = (response.status, body).into_response();
    *http.headers_mut() = response.headers;
    http
}

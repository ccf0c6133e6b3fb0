//! Incoming proxy request

use axum::http::{header, HeaderMap, Method};
use bytes::Bytes;
use serde_json::Value;

use crate::domain::cache::RequestDescriptor;

pub const ANONYMOUS_CALLER: &str = "anonymous";

const NO_CACHE_PARAM: &str = "no-cache";
const TOKEN_PARAM: &str = "token";
const API_KEY_HEADER: &str = "x-api-key";

/// Which cache tiers a request may be served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    Exact,
    Semantic,
}

/// A client request as seen by the proxy
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    method: Method,
    path: String,
    forward_uri: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    json: Option<Value>,
    mode: LookupMode,
}

impl ProxyRequest {
    /// `path` is the decoded logical path; `forward_uri` the raw path and query sent upstream.
    pub fn new(method: Method, path: impl Into<String>, forward_uri: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            forward_uri: forward_uri.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            json: None,
            mode: LookupMode::Exact,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.json = if body.is_empty() {
            None
        } else {
            serde_json::from_slice(&body).ok()
        };
        self.body = body;
        self
    }

    pub fn with_mode(mut self, mode: LookupMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn forward_uri(&self) -> &str {
        &self.forward_uri
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    pub fn is_semantic(&self) -> bool {
        self.mode == LookupMode::Semantic
    }

    fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn header_value(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `?no-cache` (any value but `false`/`0`) or `Cache-Control: no-cache`
    pub fn no_cache(&self) -> bool {
        let by_param = self
            .query_value(NO_CACHE_PARAM)
            .is_some_and(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0"));

        let by_header = self
            .header_value(header::CACHE_CONTROL)
            .is_some_and(|v| {
                v.split(',')
                    .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
            });

        by_param || by_header
    }

    /// `stream=true` in the query or `"stream": true` in a JSON body
    pub fn is_streaming(&self) -> bool {
        if self.query_value("stream") == Some("true") {
            return true;
        }
        self.json
            .as_ref()
            .and_then(|j| j.get("stream"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Model named by the JSON body or the `model` query parameter
    pub fn model(&self) -> Option<String> {
        self.json
            .as_ref()
            .and_then(|j| j.get("model"))
            .and_then(Value::as_str)
            .or_else(|| self.query_value("model"))
            .map(str::to_string)
    }

    /// A short prefix of whichever credential the caller presented
    pub fn caller_identity(&self, prefix_len: usize) -> String {
        let credential = self
            .header_value(header::AUTHORIZATION)
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| self.header_value(API_KEY_HEADER).filter(|v| !v.is_empty()))
            .or_else(|| self.query_value(TOKEN_PARAM).filter(|v| !v.is_empty()));

        match credential {
            Some(c) => c.chars().take(prefix_len.max(1)).collect(),
            None => ANONYMOUS_CALLER.to_string(),
        }
    }

    /// Text whose meaning identifies the request: user messages, else a prompt
    /// field, else the path itself.
    pub fn embedding_text(&self) -> String {
        if let Some(json) = &self.json {
            if let Some(messages) = json.get("messages").and_then(Value::as_array) {
                let text = messages
                    .iter()
                    .filter(|m| m.get("role").and_then(Value::as_str) == Some("user"))
                    .filter_map(|m| message_text(m.get("content")?))
                    .collect::<Vec<_>>()
                    .join("\n");
                if !text.trim().is_empty() {
                    return text;
                }
            }

            if let Some(prompt) = json.get("prompt").and_then(Value::as_str) {
                if !prompt.trim().is_empty() {
                    return prompt.to_string();
                }
            }
        }

        self.path.trim_matches('/').to_string()
    }

    pub fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor::new(self.method.as_str(), self.path.clone())
            .with_query(self.query.clone())
            .with_body(self.body.clone())
    }
}

fn message_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let text = parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

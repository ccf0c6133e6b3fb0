//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global recorder. Returns `None` when disabled or already installed.
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    let mut builder = PrometheusBuilder::new();
    if !config.similarity_buckets.is_empty() {
        builder = match builder.set_buckets_for_metric(
            Matcher::Full("semantic_similarity_score".to_string()),
            &config.similarity_buckets,
        ) {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid similarity buckets");
                PrometheusBuilder::new()
            }
        };
    }

    match builder.install_recorder() {
        Ok(handle) => {
            gauge!("cache_proxy_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!(path = %config.path, "Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize Prometheus metrics");
            None
        }
    }
}

pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Exact,
    Semantic,
}

impl CacheTier {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Semantic => "semantic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit,
    Miss,
    Error,
    Bypass,
}

impl LookupOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Error => "error",
            Self::Bypass => "bypass",
        }
    }
}

/// `path` should be the matched route pattern to keep label cardinality low
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

pub fn record_cache_lookup(tier: CacheTier, outcome: LookupOutcome) {
    counter!(
        "cache_lookups_total",
        "tier" => tier.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// `target` is `store` or `index`
pub fn record_population(target: &'static str, success: bool) {
    counter!(
        "cache_populations_total",
        "target" => target,
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

pub fn record_similarity(score: f32, threshold: f32) {
    histogram!("semantic_similarity_score").record(score as f64);
    gauge!("semantic_last_threshold").set(threshold as f64);
}

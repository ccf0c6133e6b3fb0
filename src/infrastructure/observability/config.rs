//! Metrics configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
    /// Histogram buckets for `semantic_similarity_score`, concentrated near 1.0
    /// where hit/miss decisions are made
    #[serde(default = "default_similarity_buckets")]
    pub similarity_buckets: Vec<f64>,
}

fn default_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_similarity_buckets() -> Vec<f64> {
    vec![0.5, 0.7, 0.8, 0.85, 0.9, 0.93, 0.95, 0.97, 0.99, 1.0]
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_metrics_path(),
            similarity_buckets: default_similarity_buckets(),
        }
    }
}

//! Semantic cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for semantic caching and the adaptive threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Whether semantic lookups run on `/semantic/...` requests
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Threshold used until a caller has `min_samples` observations
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Maximum scores retained per caller
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Share of observed scores that should land at or above the threshold
    #[serde(default = "default_target_hit_rate_percent")]
    pub target_hit_rate_percent: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Upper bound on callers with a live rolling window
    #[serde(default = "default_max_tracked_callers")]
    pub max_tracked_callers: u64,

    /// Pick uniformly among above-threshold matches instead of the best one
    #[serde(default = "default_randomize_selection")]
    pub randomize_selection: bool,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_timeout_ms")]
    pub embedding_timeout_ms: u64,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Characters of the caller credential used as its identity
    #[serde(default = "default_caller_prefix_len")]
    pub caller_prefix_len: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_threshold() -> f32 {
    0.90
}

fn default_min_samples() -> usize {
    7
}

fn default_window_size() -> usize {
    200
}

fn default_target_hit_rate_percent() -> f32 {
    20.0
}

fn default_top_k() -> usize {
    5
}

fn default_max_tracked_callers() -> u64 {
    10_000
}

fn default_randomize_selection() -> bool {
    true
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout_ms() -> u64 {
    3_000
}

fn default_query_timeout_ms() -> u64 {
    2_000
}

fn default_caller_prefix_len() -> usize {
    8
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_threshold: default_threshold(),
            min_samples: default_min_samples(),
            window_size: default_window_size(),
            target_hit_rate_percent: default_target_hit_rate_percent(),
            top_k: default_top_k(),
            max_tracked_callers: default_max_tracked_callers(),
            randomize_selection: default_randomize_selection(),
            embedding_model: default_embedding_model(),
            embedding_timeout_ms: default_embedding_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            caller_prefix_len: default_caller_prefix_len(),
        }
    }
}

impl SemanticCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_default_threshold(mut self, threshold: f32) -> Self {
        self.default_threshold = threshold.clamp(-1.0, 1.0);
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    pub fn with_target_hit_rate_percent(mut self, percent: f32) -> Self {
        self.target_hit_rate_percent = percent.clamp(0.0, 100.0);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_tracked_callers(mut self, max: u64) -> Self {
        self.max_tracked_callers = max;
        self
    }

    pub fn with_randomize_selection(mut self, randomize: bool) -> Self {
        self.randomize_selection = randomize;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_embedding_timeout(mut self, timeout: Duration) -> Self {
        self.embedding_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SemanticCacheConfig::default();

        assert!(config.enabled);
        assert!((config.default_threshold - 0.90).abs() < f32::EPSILON);
        assert_eq!(config.min_samples, 7);
        assert_eq!(config.window_size, 200);
        assert!((config.target_hit_rate_percent - 20.0).abs() < f32::EPSILON);
        assert_eq!(config.caller_prefix_len, 8);
        assert!(config.randomize_selection);
        assert_eq!(config.query_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_config_builder_clamps() {
        let config = SemanticCacheConfig::new()
            .with_target_hit_rate_percent(150.0)
            .with_window_size(0)
            .with_default_threshold(2.0)
            .with_embedding_timeout(Duration::from_millis(250));

        assert!((config.target_hit_rate_percent - 100.0).abs() < f32::EPSILON);
        assert_eq!(config.window_size, 1);
        assert!((config.default_threshold - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.embedding_timeout_ms, 250);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: SemanticCacheConfig =
            serde_json::from_str(r#"{"top_k": 3, "randomize_selection": false}"#).unwrap();

        assert_eq!(config.top_k, 3);
        assert!(!config.randomize_selection);
        assert_eq!(config.min_samples, 7);
    }
}

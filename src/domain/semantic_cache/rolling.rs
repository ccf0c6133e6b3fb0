//! Rolling similarity statistics and the percentile threshold derived from them

use std::collections::VecDeque;

use super::SemanticCacheConfig;

/// FIFO window of the most recent similarity scores for one caller
#[derive(Debug, Clone)]
pub struct RollingStatistic {
    scores: VecDeque<f32>,
    capacity: usize,
}

impl RollingStatistic {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            scores: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a score, evicting the oldest once the window is full.
    pub fn push(&mut self, score: f32) {
        if score.is_nan() {
            return;
        }
        if self.scores.len() == self.capacity {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
    }

    pub fn extend(&mut self, scores: &[f32]) {
        for score in scores {
            self.push(*score);
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Value at `floor(fraction * n)` of the ascending-sorted window, clamped to the last index.
    pub fn quantile(&self, fraction: f32) -> Option<f32> {
        if self.scores.is_empty() {
            return None;
        }

        let mut sorted: Vec<f32> = self.scores.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let index = ((fraction.clamp(0.0, 1.0) * n as f32).floor() as usize).min(n - 1);
        Some(sorted[index])
    }
}

/// Turns a rolling window into a similarity threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub default_threshold: f32,
    pub min_samples: usize,
    pub target_hit_rate_percent: f32,
}

impl ThresholdPolicy {
    /// Fixed default while cold, then the percentile that leaves roughly
    /// `target_hit_rate_percent` of observed scores at or above it.
    pub fn threshold(&self, statistic: &RollingStatistic) -> f32 {
        if statistic.len() < self.min_samples.max(1) {
            return self.default_threshold;
        }

        let fraction = (100.0 - self.target_hit_rate_percent) / 100.0;
        statistic
            .quantile(fraction)
            .unwrap_or(self.default_threshold)
    }
}

impl From<&SemanticCacheConfig> for ThresholdPolicy {
    fn from(config: &SemanticCacheConfig) -> Self {
        Self {
            default_threshold: config.default_threshold,
            min_samples: config.min_samples,
            target_hit_rate_percent: config.target_hit_rate_percent,
        }
    }
}

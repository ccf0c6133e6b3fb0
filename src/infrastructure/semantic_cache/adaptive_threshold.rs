//! Per-caller adaptive similarity threshold
//!
//! Each caller gets a rolling window of the similarity scores its semantic
//! queries produced. The threshold is the percentile of that window that keeps
//! roughly the configured share of scores at or above it. Windows live only in
//! process memory and are bounded by `max_tracked_callers`.

use std::sync::{Arc, Mutex, PoisonError};

use moka::future::Cache as MokaCache;

use crate::domain::semantic_cache::{
    RollingStatistic, SemanticCacheConfig, SimilarityMatch, ThresholdPolicy,
};

/// Diagnostic view of one caller's statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallerSnapshot {
    pub window_len: usize,
    pub threshold: f32,
}

#[derive(Debug, Clone)]
pub struct AdaptiveThresholdEstimator {
    callers: MokaCache<String, Arc<Mutex<RollingStatistic>>>,
    policy: ThresholdPolicy,
    window_size: usize,
}

impl AdaptiveThresholdEstimator {
    pub fn new(config: &SemanticCacheConfig) -> Self {
        Self {
            callers: MokaCache::builder()
                .max_capacity(config.max_tracked_callers.max(1))
                .build(),
            policy: ThresholdPolicy::from(config),
            window_size: config.window_size,
        }
    }

    async fn statistic(&self, caller: &str) -> Arc<Mutex<RollingStatistic>> {
        let window_size = self.window_size;
        self.callers
            .get_with(caller.to_string(), async move {
                Arc::new(Mutex::new(RollingStatistic::new(window_size)))
            })
            .await
    }

    /// Feeds `scores` into the caller's window and returns the threshold that
    /// now applies to them.
    pub async fn observe(&self, caller: &str, scores: &[f32]) -> f32 {
        let statistic = self.statistic(caller).await;
        let mut window = statistic.lock().unwrap_or_else(PoisonError::into_inner);
        window.extend(scores);
        self.policy.threshold(&window)
    }

    /// Current threshold without recording anything
    pub async fn threshold(&self, caller: &str) -> f32 {
        match self.callers.get(caller).await {
            Some(statistic) => {
                let window = statistic.lock().unwrap_or_else(PoisonError::into_inner);
                self.policy.threshold(&window)
            }
            None => self.policy.default_threshold,
        }
    }

    pub async fn snapshot(&self, caller: &str) -> Option<CallerSnapshot> {
        let statistic = self.callers.get(caller).await?;
        let window = statistic.lock().unwrap_or_else(PoisonError::into_inner);
        Some(CallerSnapshot {
            window_len: window.len(),
            threshold: self.policy.threshold(&window),
        })
    }

    /// Records the matches' scores and keeps those at or above the resulting threshold.
    pub async fn classify(
        &self,
        caller: &str,
        matches: Vec<SimilarityMatch>,
    ) -> (f32, Vec<SimilarityMatch>) {
        let scores: Vec<f32> = matches.iter().map(|m| m.score).collect();
        let threshold = self.observe(caller, &scores).await;

        let above = matches
            .into_iter()
            .filter(|m| m.score >= threshold)
            .collect();

        (threshold, above)
    }

    pub async fn tracked_callers(&self) -> u64 {
        self.callers.run_pending_tasks().await;
        self.callers.entry_count()
    }
}

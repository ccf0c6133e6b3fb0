//! Semantic cache infrastructure

mod adaptive_threshold;

pub use adaptive_threshold::{AdaptiveThresholdEstimator, CallerSnapshot};

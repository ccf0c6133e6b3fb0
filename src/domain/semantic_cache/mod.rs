//! Semantic cache domain models and traits
//!
//! Requests that differ textually but mean the same thing are matched through
//! embedding similarity against a vector index. Whether a match counts as a hit
//! is decided by a per-caller adaptive threshold.

mod config;
mod index;
mod rolling;

pub use config::SemanticCacheConfig;
pub use index::{EmbeddingMetadata, SimilarityMatch, VectorIndex};
pub use rolling::{RollingStatistic, ThresholdPolicy};

#[cfg(test)]
pub use index::MockVectorIndex;

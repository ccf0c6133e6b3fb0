//! Embedding provider trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use super::{EmbeddingRequest, EmbeddingResponse};
use crate::domain::DomainError;

/// Turns text into a fixed-dimension vector via an external model
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError>;

    fn provider_name(&self) -> &'static str;
}

//! Embedding request/response types

use serde::{Deserialize, Serialize};

/// A request to embed one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    model: String,
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            dimensions: None,
        }
    }

    /// Requests a reduced vector size from models that support it
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

/// A single embedding vector produced for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    model: String,
    vector: Vec<f32>,
    prompt_tokens: u32,
}

impl EmbeddingResponse {
    pub fn new(model: impl Into<String>, vector: Vec<f32>, prompt_tokens: u32) -> Self {
        Self {
            model: model.into(),
            vector,
            prompt_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    pub fn prompt_tokens(&self) -> u32 {
        self.prompt_tokens
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }
}

/// Cosine similarity in [-1, 1]; higher is more similar.
///
/// Mismatched lengths, empty input and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

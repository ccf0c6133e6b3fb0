use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Key generation failed: {message}")]
    KeyGeneration { message: String },

    #[error("Embedding unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    #[error("Vector index unavailable: {message}")]
    IndexUnavailable { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("Upstream timed out: {message}")]
    UpstreamTimeout { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    pub fn embedding_unavailable(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            message: message.into(),
        }
    }

    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn upstream_timeout(message: impl Into<String>) -> Self {
        Self::UpstreamTimeout {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for failures of the origin itself, which are the only errors surfaced to clients.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::UpstreamTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation_error() {
        let error = DomainError::key_generation("body is not JSON");
        assert_eq!(error.to_string(), "Key generation failed: body is not JSON");
    }

    #[test]
    fn test_provider_error() {
        let error = DomainError::provider("openai", "rate limited");
        assert_eq!(error.to_string(), "Provider error: openai - rate limited");
    }

    #[test]
    fn test_is_upstream() {
        assert!(DomainError::upstream("connection refused").is_upstream());
        assert!(DomainError::upstream_timeout("30s elapsed").is_upstream());
        assert!(!DomainError::index_unavailable("down").is_upstream());
        assert!(!DomainError::storage("redis").is_upstream());
    }
}

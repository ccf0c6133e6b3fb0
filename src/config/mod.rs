mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, EmbeddingSettings, LogFormat, LoggingConfig, ServerConfig,
};

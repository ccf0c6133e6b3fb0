//! Infrastructure layer - store, index, embedding and origin implementations

pub mod cache;
pub mod embedding;
pub mod http_client;
pub mod logging;
pub mod observability;
pub mod origin;
pub mod semantic_cache;
pub mod services;
pub mod vector_index;

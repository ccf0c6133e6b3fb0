//! Domain layer - entities, value objects and the traits the infrastructure implements

pub mod cache;
pub mod embedding;
pub mod error;
pub mod proxy;
pub mod semantic_cache;

pub use error::DomainError;

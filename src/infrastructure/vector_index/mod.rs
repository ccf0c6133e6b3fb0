//! Vector index implementations

mod factory;
mod http;
mod in_memory;
mod unconfigured;

pub use factory::{VectorIndexConfig, VectorIndexFactory, VectorIndexType};
pub use http::HttpVectorIndex;
pub use in_memory::InMemoryVectorIndex;
pub use unconfigured::UnconfiguredVectorIndex;

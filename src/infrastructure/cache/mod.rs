//! Exact-match response store implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{ResponseStoreFactory, StoreConfig, StoreType};
pub use in_memory::InMemoryResponseStore;
pub use redis::{RedisResponseStore, RedisStoreConfig};

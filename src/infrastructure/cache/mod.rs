//! Response cache infrastructure

mod in_memory;

pub use in_memory::{InMemoryResponseCache, ResponseCacheConfig};

//! Response caching domain model

mod repository;

pub use repository::{CacheKey, CachedResponse, ResponseCache};

//! API key infrastructure: generation, validation, admission control

pub mod generator;
mod in_memory;
mod rate_limiter;
mod validator;

pub use generator::{GeneratedKey, KeyGenerator};
pub use in_memory::InMemoryKeyStore;
pub use rate_limiter::SlidingWindowLimiter;
pub use validator::{AuthReason, AuthRejection, KeyValidator, ValidatedKey};

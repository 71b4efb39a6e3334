//! API key domain model

mod entity;
mod repository;
mod validation;

pub use entity::{ApiKey, ApiKeyId, ApiKeyStatus};
pub use repository::KeyStore;
pub use validation::{validate_api_key_id, ApiKeyIdError};

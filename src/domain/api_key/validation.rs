//! API key identifier validation

use thiserror::Error;

/// Errors that can occur while validating an API key identifier
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiKeyIdError {
    #[error("API key ID cannot be empty")]
    Empty,

    #[error("API key ID exceeds maximum length of {0} characters")]
    TooLong(usize),

    #[error("API key ID must start and end with a letter or number")]
    InvalidBoundary,

    #[error("API key ID contains invalid character: '{0}'. Only alphanumeric characters and hyphens are allowed")]
    InvalidCharacter(char),
}

const MAX_API_KEY_ID_LENGTH: usize = 64;

/// Validate an API key identifier.
///
/// Rules: non-empty, at most 64 characters, alphanumeric plus hyphens,
/// alphanumeric at both ends.
pub fn validate_api_key_id(id: &str) -> Result<(), ApiKeyIdError> {
    if id.is_empty() {
        return Err(ApiKeyIdError::Empty);
    }

    if id.len() > MAX_API_KEY_ID_LENGTH {
        return Err(ApiKeyIdError::TooLong(MAX_API_KEY_ID_LENGTH));
    }

    let first = id.chars().next().unwrap_or_default();
    let last = id.chars().last().unwrap_or_default();

    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(ApiKeyIdError::InvalidBoundary);
    }

    for c in id.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' {
            return Err(ApiKeyIdError::InvalidCharacter(c));
        }
    }

    Ok(())
}

//! Infrastructure: concrete implementations of the domain's collaborator
//! traits plus process-level concerns (logging).

pub mod api_key;
pub mod cache;
pub mod logging;
pub mod usage;

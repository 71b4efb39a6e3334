//! HTTP middleware

pub mod gateway;
pub mod logging;

pub use gateway::gateway_middleware;
pub use logging::logging_middleware;

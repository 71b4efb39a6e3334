//! Usage sink trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::record::UsageRecord;
use crate::domain::DomainError;

/// Append-only write interface to the durable usage/telemetry sink.
///
/// The sink is an external collaborator. Writes are best-effort from the
/// gateway's point of view: a failed append is logged and discarded, never
/// retried, and never affects the caller-visible response.
#[async_trait]
pub trait UsageSink: Send + Sync + Debug {
    /// Persist one usage record
    async fn append(&self, record: UsageRecord) -> Result<(), DomainError>;
}

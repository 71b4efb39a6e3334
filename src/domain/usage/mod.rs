//! Usage telemetry domain model

mod record;
mod repository;

pub use record::{UsageRecord, UsageRecordId};
pub use repository::UsageSink;

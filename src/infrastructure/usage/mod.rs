//! Usage telemetry infrastructure

mod in_memory;
mod recorder;

pub use in_memory::InMemoryUsageSink;
pub use recorder::UsageRecorder;

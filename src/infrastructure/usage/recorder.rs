//! Fire-and-forget usage recording
//!
//! A bounded queue drained by one background task. The caller never waits
//! on the sink: enqueueing is synchronous and a full queue drops the record
//! with a warning, so backpressure is defined rather than implicit. Sink
//! failures are logged and discarded, never retried.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::domain::usage::{UsageRecord, UsageSink};

/// Handle for submitting usage records from the request path
#[derive(Debug, Clone)]
pub struct UsageRecorder {
    tx: mpsc::Sender<UsageRecord>,
}

impl UsageRecorder {
    /// Start the background drain task and return the submission handle.
    ///
    /// `queue_depth` bounds how many records may be in flight; beyond that
    /// new records are dropped.
    pub fn spawn(sink: Arc<dyn UsageSink>, queue_depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<UsageRecord>(queue_depth);

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let id = record.id().clone();

                if let Err(e) = sink.append(record).await {
                    warn!(record_id = %id, error = %e, "usage sink write failed, record discarded");
                }
            }

            debug!("usage recorder drained and stopped");
        });

        Self { tx }
    }

    /// Submit one record. Never blocks and never fails the caller.
    pub fn record(&self, record: UsageRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                warn!(
                    api_key_id = %record.api_key_id,
                    "usage queue full, dropping record"
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!("usage recorder stopped, dropping record");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;
    use crate::infrastructure::usage::InMemoryUsageSink;
    use async_trait::async_trait;
    use std::time::Duration;

    fn record(status: u16) -> UsageRecord {
        UsageRecord::new("svc-key", "/v1/a", "GET", status)
    }

    #[derive(Debug)]
    struct FailingSink;

    #[async_trait]
    impl UsageSink for FailingSink {
        async fn append(&self, _record: UsageRecord) -> Result<(), DomainError> {
            Err(DomainError::telemetry("sink offline"))
        }
    }

    #[derive(Debug)]
    struct SlowSink {
        inner: InMemoryUsageSink,
    }

    #[async_trait]
    impl UsageSink for SlowSink {
        async fn append(&self, record: UsageRecord) -> Result<(), DomainError> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.inner.append(record).await
        }
    }

    #[tokio::test]
    async fn test_records_reach_the_sink() {
        let sink = Arc::new(InMemoryUsageSink::new());
        let recorder = UsageRecorder::spawn(sink.clone(), 16);

        recorder.record(record(200));
        recorder.record(record(429));

        tokio::time::sleep(Duration::from_millis(50)).await;

        let records = sink.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status_code, 200);
        assert_eq!(records[1].status_code, 429);
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let recorder = UsageRecorder::spawn(Arc::new(FailingSink), 16);

        // Must not panic or surface anything.
        recorder.record(record(200));
        tokio::time::sleep(Duration::from_millis(20)).await;
        recorder.record(record(200));
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let slow = Arc::new(SlowSink {
            inner: InMemoryUsageSink::new(),
        });
        let recorder = UsageRecorder::spawn(slow.clone(), 2);

        for _ in 0..20 {
            recorder.record(record(200));
        }

        // Enqueueing 20 records against depth 2 returned immediately;
        // the drain eventually lands at most depth + in-flight records.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let stored = slow.inner.records().await.len();
        assert!(stored <= 4, "expected drops, got {} stored", stored);
        assert!(stored >= 1);
    }
}

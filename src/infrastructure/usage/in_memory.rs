//! In-memory usage sink
//!
//! Append-only store for tests and demos, with simple query helpers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::usage::{UsageRecord, UsageSink};
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryUsageSink {
    records: Arc<RwLock<Vec<UsageRecord>>>,
}

impl InMemoryUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in append order
    pub async fn records(&self) -> Vec<UsageRecord> {
        self.records.read().await.clone()
    }

    /// Records for one API key, in append order
    pub async fn records_for_key(&self, api_key_id: &str) -> Vec<UsageRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.api_key_id == api_key_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl UsageSink for InMemoryUsageSink {
    async fn append(&self, record: UsageRecord) -> Result<(), DomainError> {
        self.records.write().await.push(record);
        Ok(())
    }
}

//! In-memory response cache
//!
//! TTL plus capacity-bounded storage for successful idempotent responses.
//! Eviction follows a deterministic insertion-ordered queue: the entry that
//! entered the cache first is the one evicted, with queue entries for
//! already-removed keys skipped. Re-inserting an existing key replaces the
//! payload but keeps its original queue position, so the policy is
//! approximate oldest-insertion-order rather than LRU.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::cache::{CacheKey, CachedResponse, ResponseCache};
use crate::domain::DomainError;

/// Configuration for the in-memory response cache
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    /// Maximum age before an entry is treated as a miss
    pub ttl: Duration,
    /// Maximum number of entries held at once
    pub capacity: usize,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            capacity: 1024,
        }
    }
}

#[derive(Debug)]
struct Entry {
    response: CachedResponse,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<String, Entry>,
    insertion_order: VecDeque<String>,
}

/// Node-local `ResponseCache` implementation
#[derive(Debug)]
pub struct InMemoryResponseCache {
    table: RwLock<Table>,
    config: ResponseCacheConfig,
}

impl InMemoryResponseCache {
    pub fn new(config: ResponseCacheConfig) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            config,
        }
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry.inserted_at.elapsed() > self.config.ttl
    }
}

impl Default for InMemoryResponseCache {
    fn default() -> Self {
        Self::new(ResponseCacheConfig::default())
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, DomainError> {
        let rendered = key.render();
        let mut table = self.table.write().await;

        match table.entries.get(&rendered) {
            Some(entry) if !self.is_expired(entry) => return Ok(Some(entry.response.clone())),
            None => return Ok(None),
            Some(_) => {}
        }

        // Drop both the entry and its queue slot, otherwise a later
        // re-insertion of the same key would hold two queue positions and
        // the stale front slot could evict the fresh entry.
        table.entries.remove(&rendered);
        table.insertion_order.retain(|k| k != &rendered);
        Ok(None)
    }

    async fn put(&self, key: &CacheKey, response: CachedResponse) -> Result<(), DomainError> {
        let rendered = key.render();
        let mut table = self.table.write().await;

        let entry = Entry {
            response,
            inserted_at: Instant::now(),
        };

        if table.entries.insert(rendered.clone(), entry).is_some() {
            // Existing key: payload replaced, queue position unchanged.
            return Ok(());
        }

        // Evict the oldest live entry once over capacity, skipping queue
        // entries whose key was already removed.
        while table.entries.len() > self.config.capacity {
            match table.insertion_order.pop_front() {
                Some(oldest) => {
                    table.entries.remove(&oldest);
                }
                None => break,
            }
        }

        table.insertion_order.push_back(rendered);
        Ok(())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        Ok(self.table.read().await.entries.len())
    }
}

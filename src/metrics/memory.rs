//! In-process metrics store.
//!
//! Used when no shared store is configured and by the test suite. Counters
//! and lists live in separate concurrent maps; each operation holds only the
//! shard lock of its own key.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::metrics::store::{glob_match, MetricsStore, StoreError};

#[derive(Debug)]
pub struct MemoryStore {
    counters: DashMap<String, i64>,
    lists: DashMap<String, VecDeque<f64>>,
    retention: usize,
}

impl MemoryStore {
    /// Create a store keeping at most `retention` samples per list.
    pub fn new(retention: usize) -> Self {
        Self {
            counters: DashMap::new(),
            lists: DashMap::new(),
            retention: retention.max(1),
        }
    }

    fn add(&self, key: &str, delta: i64) -> i64 {
        let mut value = self.counters.entry(key.to_string()).or_insert(0);
        *value += delta;
        *value
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::config::schema::MetricsConfig::default().sample_retention)
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn increment_counter(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.add(key, 1))
    }

    async fn increment_gauge(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.add(key, 1))
    }

    async fn decrement_gauge(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.add(key, -1))
    }

    async fn push_sample(&self, key: &str, value: f64) -> Result<(), StoreError> {
        let mut list = self.lists.entry(key.to_string()).or_default();
        list.push_front(value);
        list.truncate(self.retention);
        Ok(())
    }

    async fn read_counter(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.counters.get(key).map(|v| *v).unwrap_or(0))
    }

    async fn read_list(&self, key: &str) -> Result<Vec<f64>, StoreError> {
        Ok(self
            .lists
            .get(key)
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let counters = self.counters.iter().map(|e| e.key().clone());
        let lists = self.lists.iter().map(|e| e.key().clone());
        Ok(counters
            .chain(lists)
            .filter(|key| glob_match(pattern, key))
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

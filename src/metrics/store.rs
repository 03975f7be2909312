//! Metrics store contract and key space.

use std::time::Duration;

use async_trait::async_trait;

/// Error talking to the metrics store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("invalid redis address '{address}': {reason}")]
    Address { address: String, reason: String },
    #[error("metrics store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Narrow counter / gauge / sample-list contract over a shared store.
///
/// Every operation is atomic on its own key. Nothing is atomic across keys:
/// a reader may see a request counted before its latency sample lands.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Increment a monotonic counter, returning the new value.
    async fn increment_counter(&self, key: &str) -> Result<i64, StoreError>;

    /// Increment a gauge, returning the new value.
    async fn increment_gauge(&self, key: &str) -> Result<i64, StoreError>;

    /// Decrement a gauge, returning the new value.
    async fn decrement_gauge(&self, key: &str) -> Result<i64, StoreError>;

    /// Prepend a sample, keeping only the store's retention window.
    async fn push_sample(&self, key: &str, value: f64) -> Result<(), StoreError>;

    /// Read a counter or gauge; missing keys read as 0.
    async fn read_counter(&self, key: &str) -> Result<i64, StoreError>;

    /// Read a sample list, most recent first; missing keys read as empty.
    async fn read_list(&self, key: &str) -> Result<Vec<f64>, StoreError>;

    /// Keys matching a glob pattern where `*` matches any run of characters.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

pub const REQUEST_COUNT_SUFFIX: &str = ":requestCount";
pub const RESPONSE_TIMES_SUFFIX: &str = ":responseTimes";
pub const ACTIVE_CONNECTIONS_SUFFIX: &str = ":activeConnections";
pub const PROXY_LATENCIES_KEY: &str = "proxyLatencies";

pub fn request_count_key(name: &str) -> String {
    format!("{}{}", name, REQUEST_COUNT_SUFFIX)
}

pub fn response_times_key(name: &str) -> String {
    format!("{}{}", name, RESPONSE_TIMES_SUFFIX)
}

pub fn active_connections_key(name: &str) -> String {
    format!("{}{}", name, ACTIVE_CONNECTIONS_SUFFIX)
}

/// Match `key` against a pattern supporting only the `*` wildcard.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if key.len() < first.len() + last.len() || !key.starts_with(first) || !key.ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

//! Read-side stats snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::metrics::store::{
    active_connections_key, request_count_key, response_times_key, MetricsStore, StoreError,
    ACTIVE_CONNECTIONS_SUFFIX, PROXY_LATENCIES_KEY, REQUEST_COUNT_SUFFIX,
};

/// Per-backend figures in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendStats {
    pub request_count: i64,
    /// Reserved; needs time-bucketed counters and is always null.
    pub requests_per_second: Option<f64>,
    pub avg_latency_ms: f64,
    pub active_connections: i64,
    pub inflight: i64,
}

/// Point-in-time view over the metrics store. Reads many keys without a
/// transaction, so figures are approximate under load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub active_servers: usize,
    pub servers: BTreeMap<String, BackendStats>,
    pub proxy_avg_added_latency_ms: f64,
    pub generated_at_unix_ms: i64,
}

/// Builds [`StatsSnapshot`]s on demand.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn MetricsStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Every backend name that has recorded a request or a connection.
    pub async fn backend_names(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut names = BTreeSet::new();
        for suffix in [REQUEST_COUNT_SUFFIX, ACTIVE_CONNECTIONS_SUFFIX] {
            let keys = self.store.scan_keys(&format!("*{}", suffix)).await?;
            names.extend(
                keys.iter()
                    .filter_map(|k| k.strip_suffix(suffix))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(names)
    }

    pub async fn snapshot(&self) -> Result<StatsSnapshot, StoreError> {
        let names = self.backend_names().await?;

        let mut servers = BTreeMap::new();
        let mut active_servers = 0;
        for name in names {
            let request_count = self.store.read_counter(&request_count_key(&name)).await?;
            let active_connections = self.store.read_counter(&active_connections_key(&name)).await?;
            let samples = self.store.read_list(&response_times_key(&name)).await?;

            if active_connections > 0 {
                active_servers += 1;
            }

            servers.insert(
                name,
                BackendStats {
                    request_count,
                    requests_per_second: None,
                    avg_latency_ms: mean(&samples),
                    active_connections,
                    inflight: active_connections,
                },
            );
        }

        let proxy_samples = self.store.read_list(PROXY_LATENCIES_KEY).await?;

        Ok(StatsSnapshot {
            active_servers,
            servers,
            proxy_avg_added_latency_ms: mean(&proxy_samples),
            generated_at_unix_ms: unix_millis(),
        })
    }
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

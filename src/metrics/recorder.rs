//! Write-side telemetry helpers over a [`MetricsStore`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::pool::ServerPool;
use crate::load_balancer::BackendLoad;
use crate::metrics::stats::mean;
use crate::metrics::store::{
    active_connections_key, request_count_key, response_times_key, MetricsStore, StoreError,
    PROXY_LATENCIES_KEY,
};

/// Default bound on one recorder call.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

/// Records per-backend and per-request telemetry.
///
/// Cheap to clone; every clone shares the same store. Every call is bounded
/// by the operation timeout, so a store that stops answering turns into
/// [`StoreError::Timeout`] instead of stalling the dispatcher.
#[derive(Clone)]
pub struct MetricsRecorder {
    store: Arc<dyn MetricsStore>,
    op_timeout: Duration,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self {
            store,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn MetricsStore> {
        &self.store
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }

    /// `N:requestCount` += 1
    pub async fn request_hit(&self, name: &str) -> Result<(), StoreError> {
        self.bounded(self.store.increment_counter(&request_count_key(name)))
            .await?;
        Ok(())
    }

    /// Time taken by backend `name` to answer, in milliseconds.
    pub async fn response_time_log(&self, name: &str, ms: f64) -> Result<(), StoreError> {
        self.bounded(self.store.push_sample(&response_times_key(name), ms))
            .await
    }

    /// Time spent dispatching one request end to end, in milliseconds.
    pub async fn proxy_latency(&self, ms: f64) -> Result<(), StoreError> {
        self.bounded(self.store.push_sample(PROXY_LATENCIES_KEY, ms))
            .await
    }

    pub async fn add_connection(&self, name: &str) -> Result<i64, StoreError> {
        self.bounded(self.store.increment_gauge(&active_connections_key(name)))
            .await
    }

    pub async fn remove_connection(&self, name: &str) -> Result<i64, StoreError> {
        self.bounded(self.store.decrement_gauge(&active_connections_key(name)))
            .await
    }

    pub async fn active_connections(&self, name: &str) -> Result<i64, StoreError> {
        self.bounded(self.store.read_counter(&active_connections_key(name)))
            .await
    }

    /// Mean of the retained response-time samples, 0 when there are none.
    pub async fn average_response_time(&self, name: &str) -> Result<f64, StoreError> {
        let samples = self
            .bounded(self.store.read_list(&response_times_key(name)))
            .await?;
        Ok(mean(&samples))
    }

    /// Record one successful dispatch.
    ///
    /// The three writes are independent; readers may observe any prefix.
    /// The whole batch shares one operation timeout.
    pub async fn collect_metrics(
        &self,
        name: &str,
        backend_ms: f64,
        proxy_ms: f64,
    ) -> Result<(), StoreError> {
        self.bounded(async {
            self.store.increment_counter(&request_count_key(name)).await?;
            self.store
                .push_sample(&response_times_key(name), backend_ms)
                .await?;
            self.store.push_sample(PROXY_LATENCIES_KEY, proxy_ms).await
        })
        .await
    }

    /// Current load of every backend, in pool order. The whole read shares
    /// one operation timeout.
    pub async fn load_view(&self, pool: &ServerPool) -> Result<Vec<BackendLoad>, StoreError> {
        self.bounded(async {
            let mut loads = Vec::with_capacity(pool.len());
            for backend in pool.backends() {
                let active_connections = self
                    .store
                    .read_counter(&active_connections_key(&backend.name))
                    .await?;
                let samples = self
                    .store
                    .read_list(&response_times_key(&backend.name))
                    .await?;
                loads.push(BackendLoad {
                    active_connections,
                    avg_response_ms: mean(&samples),
                });
            }
            Ok(loads)
        })
        .await
    }
}

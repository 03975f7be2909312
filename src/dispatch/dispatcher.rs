//! The single consumer of a pool's intake queue.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::dispatch::intake::IntakeReceiver;
use crate::dispatch::request::{DispatchError, PendingRequest};
use crate::load_balancer::pool::ServerPool;
use crate::load_balancer::{BackendLoad, SelectionContext, Strategy};
use crate::metrics::MetricsRecorder;
use crate::observability::metrics;
use crate::upstream::BackendClient;

/// Takes requests off the intake queue one at a time, selects a backend,
/// forwards, and completes the request.
pub struct Dispatcher {
    pool: Arc<ServerPool>,
    strategy: Strategy,
    client: BackendClient,
    recorder: MetricsRecorder,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<ServerPool>,
        strategy: Strategy,
        client: BackendClient,
        recorder: MetricsRecorder,
    ) -> Self {
        Self {
            pool,
            strategy,
            client,
            recorder,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Consume the queue until every producer is gone or `shutdown` fires.
    ///
    /// On shutdown the queue is closed to new submissions and whatever is
    /// already queued is still dispatched.
    pub async fn run(self, mut intake: IntakeReceiver, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            strategy = self.strategy.name(),
            backends = self.pool.len(),
            "Dispatcher starting"
        );

        loop {
            tokio::select! {
                next = intake.next_for_dispatch() => match next {
                    Some(request) => self.dispatch(request).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Dispatcher received shutdown signal, draining queue");
                    intake.close();
                    let mut drained = 0usize;
                    while let Some(request) = intake.next_for_dispatch().await {
                        self.dispatch(request).await;
                        drained += 1;
                    }
                    tracing::info!(drained, "Intake queue drained");
                    break;
                }
            }
        }

        tracing::info!("Dispatcher stopped");
    }

    /// Handle one request end to end. The completion fires on every path.
    pub async fn dispatch(&self, request: PendingRequest) {
        let start = Instant::now();
        let PendingRequest {
            request_id,
            method,
            uri,
            headers,
            body,
            completion,
        } = request;

        let loads = if self.strategy.needs_load() {
            self.load_view().await
        } else {
            Vec::new()
        };
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        let ctx = SelectionContext { url, loads: &loads };

        let index = match self.strategy.select(&self.pool, ctx) {
            Ok(index) => index,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Backend selection failed");
                completion.complete(Err(DispatchError::from(e)));
                return;
            }
        };
        let Some(backend) = self.pool.get(index) else {
            tracing::error!(request_id = %request_id, index, "Strategy returned an index outside the pool");
            completion.complete(Err(DispatchError::Abandoned));
            return;
        };

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            url = %url,
            backend = %backend.name,
            "Dispatching request"
        );

        let method_label = method.to_string();
        match self.client.forward(backend, method, &headers, body).await {
            Ok(response) => {
                let backend_ms = response.latency_ms;
                let status = response.status.as_u16();
                completion.complete(Ok(response));

                let proxy_ms = start.elapsed().as_secs_f64() * 1000.0;
                metrics::record_request(&method_label, status, &backend.name, start);
                if let Err(e) = self
                    .recorder
                    .collect_metrics(&backend.name, backend_ms, proxy_ms)
                    .await
                {
                    tracing::warn!(backend = %backend.name, error = %e, "Failed to record request metrics");
                }
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    backend = %backend.name,
                    kind = e.kind(),
                    error = %e,
                    "Forward failed"
                );
                metrics::record_forward_failure(&backend.name, e.kind());
                let outcome = DispatchError::Forward {
                    backend: backend.name.clone(),
                    source: e,
                };
                metrics::record_request(
                    &method_label,
                    outcome.status_code().as_u16(),
                    &backend.name,
                    start,
                );
                completion.complete(Err(outcome));
            }
        }
    }

    async fn load_view(&self) -> Vec<BackendLoad> {
        match self.recorder.load_view(&self.pool).await {
            Ok(loads) => loads,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read backend load, selecting in pool order");
                vec![BackendLoad::default(); self.pool.len()]
            }
        }
    }
}

//! Active health checking.
//!
//! # Responsibilities
//! - Ping every backend on demand for the `/serversHealth` summary
//! - Optionally ping on a timer and publish `proxy_backend_up`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::HealthCheckConfig;
use crate::load_balancer::pool::ServerPool;
use crate::observability::metrics;
use crate::upstream::BackendClient;

/// Ping every backend concurrently. Keys are 1-based pool positions.
pub async fn servers_health(pool: &ServerPool, client: &BackendClient) -> BTreeMap<usize, bool> {
    let pings = pool.backends().iter().map(|backend| client.ping(backend));
    join_all(pings)
        .await
        .into_iter()
        .enumerate()
        .map(|(i, up)| (i + 1, up))
        .collect()
}

pub struct HealthMonitor {
    pool: Arc<ServerPool>,
    client: BackendClient,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServerPool>, client: BackendClient, config: HealthCheckConfig) -> Self {
        Self {
            pool,
            client,
            config,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(interval = self.config.interval_secs, "Health monitor starting");

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        let mut last: Vec<Option<bool>> = vec![None; self.pool.len()];

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all(&mut last).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self, last: &mut [Option<bool>]) {
        let results = servers_health(&self.pool, &self.client).await;

        for (backend, (slot, (_, &up))) in self
            .pool
            .backends()
            .iter()
            .zip(last.iter_mut().zip(results.iter()))
        {
            if *slot != Some(up) {
                if up {
                    tracing::info!(backend = %backend.name, "Backend is answering pings");
                } else {
                    tracing::warn!(backend = %backend.name, "Backend stopped answering pings");
                }
                *slot = Some(up);
            }
            metrics::record_backend_health(&backend.name, up);
        }
    }
}

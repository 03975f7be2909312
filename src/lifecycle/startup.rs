//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated configuration, in dependency order
//! - Start background tasks (dispatcher, health monitor)
//! - Serve on the given listener last, so traffic only arrives when ready
//!
//! # Design Decisions
//! - Fail fast: an invalid config or an unreachable metrics store is fatal
//! - The config is validated here too, for callers that skip the loader
//! - The caller binds the listener, so tests can use ephemeral ports

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig};
use crate::dispatch::{intake_queue, Dispatcher};
use crate::health::HealthMonitor;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::security::{RateLimiter, CLEANUP_INTERVAL, MAX_IDLE};
use crate::load_balancer::pool::{PoolError, ServerPool};
use crate::load_balancer::Strategy;
use crate::metrics::{self, MetricsRecorder, StatsAggregator, StoreError};
use crate::upstream::BackendClient;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("invalid backend pool: {0}")]
    Pool(#[from] PoolError),
    #[error("metrics store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// A started proxy.
pub struct RunningProxy {
    pub local_addr: SocketAddr,
    server: JoinHandle<Result<(), std::io::Error>>,
    dispatcher: JoinHandle<()>,
}

impl RunningProxy {
    /// Wait until the server has stopped and the dispatcher has drained.
    pub async fn wait(self) -> Result<(), std::io::Error> {
        let served = match self.server.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        };
        if let Err(e) = self.dispatcher.await {
            tracing::error!(error = %e, "Dispatcher task failed");
        }
        served
    }
}

/// Build and start the proxy on `listener`.
pub async fn start(
    config: &ProxyConfig,
    listener: TcpListener,
    shutdown: Shutdown,
) -> Result<RunningProxy, StartupError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let pool = Arc::new(ServerPool::from_config(&config.pool)?);
    let strategy = Strategy::from_name(pool.strategy_name(), config.strategy.hash_seed);
    tracing::info!(
        strategy = strategy.name(),
        backends = pool.len(),
        "Backend pool ready"
    );

    let connect_timeout = Duration::from_millis(config.metrics.connect_timeout_ms);
    let store = match tokio::time::timeout(connect_timeout, async {
        let store = metrics::connect(&config.metrics).await?;
        store.ping().await?;
        Ok::<_, StoreError>(store)
    })
    .await
    {
        Ok(store) => store?,
        Err(_) => return Err(StoreError::Timeout(connect_timeout).into()),
    };

    let recorder = MetricsRecorder::new(store.clone())
        .with_op_timeout(Duration::from_millis(config.metrics.op_timeout_ms));
    let client = BackendClient::new(&config.timeouts, recorder.clone());
    let (intake, receiver) = intake_queue(config.intake.capacity);

    let dispatcher = Dispatcher::new(pool.clone(), strategy, client.clone(), recorder);
    let dispatcher = tokio::spawn(dispatcher.run(receiver, shutdown.subscribe()));

    if config.health_check.enabled {
        let monitor = HealthMonitor::new(pool.clone(), client.clone(), config.health_check.clone());
        tokio::spawn(monitor.run(shutdown.subscribe()));
    }

    let state = AppState {
        intake,
        stats: StatsAggregator::new(store),
        pool,
        client,
    };
    let rate_limiter = if config.rate_limit.enabled {
        tracing::info!(
            rps = config.rate_limit.requests_per_second,
            burst = config.rate_limit.burst_size,
            "Rate limiting enabled"
        );
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        tokio::spawn(limiter.clone().run_cleanup(
            CLEANUP_INTERVAL,
            MAX_IDLE,
            shutdown.subscribe(),
        ));
        Some(limiter)
    } else {
        None
    };
    let server = HttpServer::new(state, &config.limits, rate_limiter);

    let local_addr = listener.local_addr()?;
    let server = tokio::spawn(server.run(listener, shutdown));

    Ok(RunningProxy {
        local_addr,
        server,
        dispatcher,
    })
}

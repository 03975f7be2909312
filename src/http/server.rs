//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: stats, liveness, backend health, intake fallback
//! - Wire up middleware (trace, request ID, body limit, rate limit)
//! - Buffer each inbound body and hand the request to the intake queue
//! - Turn dispatch outcomes into client responses
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderName, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::schema::LimitsConfig;
use crate::dispatch::IntakeQueue;
use crate::health::servers_health;
use crate::lifecycle::Shutdown;
use crate::load_balancer::pool::ServerPool;
use crate::metrics::StatsAggregator;
use crate::security::{rate_limit_middleware, RateLimiter};
use crate::upstream::BackendClient;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub intake: IntakeQueue,
    pub stats: StatsAggregator,
    pub pool: Arc<ServerPool>,
    pub client: BackendClient,
}

/// Front end of the load balancer.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// `rate_limiter` is `None` when rate limiting is disabled.
    pub fn new(
        state: AppState,
        limits: &LimitsConfig,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        Self {
            router: Self::build_router(state, limits, rate_limiter),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        state: AppState,
        limits: &LimitsConfig,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut router = Router::new()
            .route("/stats", get(stats_handler).fallback(proxy_handler))
            .route("/health", get(health_handler).fallback(proxy_handler))
            .route("/serversHealth", get(servers_health_handler).fallback(proxy_handler))
            .fallback(proxy_handler)
            .with_state(state);

        if let Some(limiter) = rate_limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router.layer(DefaultBodyLimit::disable()).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(RequestBodyLimitLayer::new(limits.max_body_bytes)),
        )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

async fn stats_handler(State(state): State<AppState>) -> Response {
    match state.stats.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build stats snapshot");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics store unavailable").into_response()
        }
    }
}

async fn servers_health_handler(State(state): State<AppState>) -> Response {
    Json(servers_health(&state.pool, &state.client).await).into_response()
}

/// Everything that is not a management route goes through the intake.
async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(request_id = %request_id, method = %method, uri = %uri, "Queueing request");

    match state
        .intake
        .dispatch(request_id.clone(), method, uri, headers, body)
        .await
    {
        Ok(forwarded) => {
            let mut response = Response::new(Body::from(forwarded.body));
            *response.status_mut() = forwarded.status;
            *response.headers_mut() = forwarded.headers;
            response
        }
        Err(e) => {
            let status = e.status_code();
            tracing::warn!(request_id = %request_id, status = %status, error = %e, "Request failed");
            (status, e.to_string()).into_response()
        }
    }
}

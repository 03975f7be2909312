//! Outbound calls to backend application servers.

use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::schema::TimeoutConfig;
use crate::load_balancer::backend::Backend;
use crate::metrics::MetricsRecorder;

/// Upper bound on a buffered backend response body.
const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Ping answers are discarded; anything longer is left unread.
const MAX_PING_BODY_BYTES: usize = 64 * 1024;

/// Connection-scoped headers that are never forwarded in either direction.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Why a forward call failed. Nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to build backend request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("backend connection failed: {0}")]
    Connect(#[source] hyper_util::client::legacy::Error),
    #[error("backend sent an unusable response: {0}")]
    Protocol(#[source] hyper_util::client::legacy::Error),
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("backend response could not be read: {0}")]
    InvalidResponse(#[source] axum::Error),
}

impl ForwardError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Request(_) => "request",
            ForwardError::Connect(_) => "connect",
            ForwardError::Protocol(_) => "protocol",
            ForwardError::Timeout(_) => "timeout",
            ForwardError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// A backend's answer, fully buffered.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Wall-clock time of the call itself, in milliseconds.
    pub latency_ms: f64,
}

/// HTTP client for forwarding work and pinging backends.
#[derive(Clone)]
pub struct BackendClient {
    client: Client<HttpConnector, Body>,
    recorder: MetricsRecorder,
    forward_timeout: Duration,
    ping_timeout: Duration,
}

impl BackendClient {
    pub fn new(timeouts: &TimeoutConfig, recorder: MetricsRecorder) -> Self {
        let forward_timeout = Duration::from_millis(timeouts.forward_ms);
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(forward_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            recorder,
            forward_timeout,
            ping_timeout: Duration::from_millis(timeouts.ping_ms),
        }
    }

    pub fn forward_timeout(&self) -> Duration {
        self.forward_timeout
    }

    /// Forward one request to `backend`'s `/process` endpoint.
    ///
    /// The backend's `activeConnections` gauge is raised right before the
    /// call and lowered right after it, whatever the outcome.
    pub async fn forward(
        &self,
        backend: &Backend,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<ForwardResponse, ForwardError> {
        let mut builder = Request::builder()
            .method(method)
            .uri(backend.forward_uri().clone());
        if let Some(out) = builder.headers_mut() {
            *out = end_to_end(headers);
        }
        let request = builder.body(Body::from(body))?;

        let counted = match self.recorder.add_connection(&backend.name).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(backend = %backend.name, error = %e, "Failed to raise connection gauge");
                false
            }
        };

        let result = self.call(request).await;

        if counted {
            if let Err(e) = self.recorder.remove_connection(&backend.name).await {
                tracing::warn!(backend = %backend.name, error = %e, "Failed to lower connection gauge");
            }
        }

        result
    }

    async fn call(&self, request: Request<Body>) -> Result<ForwardResponse, ForwardError> {
        let exchange = async {
            let start = Instant::now();
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| {
                    if e.is_connect() {
                        ForwardError::Connect(e)
                    } else {
                        ForwardError::Protocol(e)
                    }
                })?;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), MAX_RESPONSE_BYTES)
                .await
                .map_err(ForwardError::InvalidResponse)?;

            Ok(ForwardResponse {
                status: parts.status,
                headers: end_to_end(&parts.headers),
                body,
                latency_ms,
            })
        };

        match tokio::time::timeout(self.forward_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(self.forward_timeout)),
        }
    }

    /// Liveness check: GET on the backend's base URL, true only on 2xx.
    pub async fn ping(&self, backend: &Backend) -> bool {
        let request = match Request::builder()
            .method(Method::GET)
            .uri(backend.ping_uri().clone())
            .header(header::USER_AGENT, "lb-proxy-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %backend.name, error = %e, "Failed to build ping request");
                return false;
            }
        };

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            // read the body so the connection can go back to the pool
            let drained = axum::body::to_bytes(Body::new(response.into_body()), MAX_PING_BODY_BYTES)
                .await
                .is_ok();
            Ok::<_, hyper_util::client::legacy::Error>((status, drained))
        };

        match tokio::time::timeout(self.ping_timeout, exchange).await {
            Ok(Ok((status, drained))) => {
                if !drained {
                    tracing::debug!(backend = %backend.name, "Ping body could not be read");
                }
                let success = status.is_success();
                if !success {
                    tracing::debug!(backend = %backend.name, status = %status, "Ping failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %backend.name, error = %e, "Ping failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %backend.name, "Ping failed: timeout");
                false
            }
        }
    }
}

/// Copy every header except the hop-by-hop ones, keeping repeated values.
pub fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !HOP_BY_HOP.contains(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

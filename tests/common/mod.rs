//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::any, routing::get, Router};
use tokio::net::TcpListener;

use lb_proxy::config::{BackendConfig, ProxyConfig};

/// A stub application server answering `/process` with its own name.
pub struct StubBackend {
    pub name: String,
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl StubBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> BackendConfig {
        BackendConfig {
            name: self.name.clone(),
            address: self.addr.to_string(),
            weight: 1.0,
        }
    }
}

/// Start a stub backend on an ephemeral port.
pub async fn start_backend(name: &str) -> StubBackend {
    start_slow_backend(name, Duration::ZERO).await
}

/// Start a stub backend that waits `delay` before answering `/process`.
pub async fn start_slow_backend(name: &str, delay: Duration) -> StubBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let body = name.to_string();
    let counter = hits.clone();

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/process",
            any(move || {
                let body = body.clone();
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    body
                }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    StubBackend {
        name: name.to_string(),
        addr,
        hits,
    }
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Proxy configuration over the given backends with the in-memory store.
pub fn proxy_config(algorithm: &str, backends: &[&StubBackend]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.pool.algorithm = algorithm.to_string();
    config.pool.backends = backends.iter().map(|b| b.config()).collect();
    config
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

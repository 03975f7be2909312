//! Reverse-proxy load balancer library.

// Core request path
pub mod config;
pub mod dispatch;
pub mod http;
pub mod load_balancer;
pub mod upstream;

// Telemetry
pub mod metrics;
pub mod observability;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend pool and dispatch algorithm.
    pub pool: PoolConfig,

    /// Intake queue sizing.
    pub intake: IntakeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Strategy tuning.
    pub strategy: StrategyConfig,

    /// Metrics store connection and retention.
    pub metrics: MetricsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Periodic backend probing.
    pub health_check: HealthCheckConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend pool definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Dispatch algorithm name, e.g. "round robin" or "least connections".
    pub algorithm: String,

    /// Port appended to backend addresses that do not carry their own.
    pub communication_port: u16,

    /// Backend application servers, in dispatch order.
    pub backends: Vec<BackendConfig>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            algorithm: "round robin".to_string(),
            communication_port: 8989,
            backends: Vec::new(),
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier, also the metrics key prefix.
    pub name: String,

    /// Host ("10.0.0.5") or host:port ("10.0.0.5:9000").
    pub address: String,

    /// Weight for weighted strategies, on a 1-10 scale.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Intake queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Maximum number of requests waiting for dispatch.
    pub capacity: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Timeout configuration for backend calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Forwarding timeout in milliseconds.
    pub forward_ms: u64,

    /// Liveness ping timeout in milliseconds.
    pub ping_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            forward_ms: 2000,
            ping_ms: 500,
        }
    }
}

/// Strategy tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Seed for the URL hash strategy.
    pub hash_seed: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            hash_seed: crate::load_balancer::url_hash::DEFAULT_SEED,
        }
    }
}

/// Which metrics store implementation to use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricsBackend {
    /// In-process store; metrics are lost on restart.
    #[default]
    Memory,
    /// Shared Redis-compatible store.
    Redis,
}

/// Metrics store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub backend: MetricsBackend,

    /// Redis address, e.g. "127.0.0.1:6379" or a full "redis://" URL.
    pub redis_address: String,

    pub redis_username: Option<String>,

    pub redis_password: Option<String>,

    /// Number of most recent samples kept per list.
    pub sample_retention: usize,

    /// Upper bound on one metrics read or write on the request path. A store
    /// slower than this is skipped for that request.
    pub op_timeout_ms: u64,

    /// Upper bound on connecting to the store at startup.
    pub connect_timeout_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            backend: MetricsBackend::Memory,
            redis_address: "127.0.0.1:6379".to_string(),
            redis_username: None,
            redis_password: None,
            sample_retention: 1000,
            op_timeout_ms: 250,
            connect_timeout_ms: 5000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting. When disabled every request passes.
    pub enabled: bool,

    /// Maximum requests per second per client IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Periodic backend probing. Only feeds the `proxy_backend_up` gauge and the
/// log; selection never skips a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub enabled: bool,

    /// Seconds between health check rounds.
    pub interval_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
        }
    }
}

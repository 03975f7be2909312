//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → ServerPool built once and shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the pool is never reloaded at runtime
//! - Every section has defaults; a config may list only its backends
//! - serde catches shape errors, validation.rs reports every semantic error at once
//! - REDIS_ADDR / REDIS_USER / REDIS_PASSWORD override the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::BackendConfig;
pub use schema::MetricsBackend;
pub use schema::PoolConfig;
pub use schema::ProxyConfig;

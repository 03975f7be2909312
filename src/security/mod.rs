//! Front-end request guards.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, when enabled)
//!     → body limit (tower_http, configured in http/server.rs)
//!     → intake
//! ```

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter, CLEANUP_INTERVAL, MAX_IDLE};

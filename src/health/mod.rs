//! Backend liveness.
//!
//! # Data Flow
//! ```text
//! GET /serversHealth
//!     → active.rs servers_health (one concurrent ping per backend)
//!     → {"1": true, "2": false}
//!
//! Optional timer (health_check.enabled)
//!     → active.rs HealthMonitor
//!     → proxy_backend_up gauge + state-change log lines
//! ```
//!
//! # Design Decisions
//! - Results are informational; selection never skips a backend
//! - Ping timeout is separate from (and shorter than) the forward timeout

pub mod active;

pub use active::{servers_health, HealthMonitor};

//! Upstream (backend) communication.
//!
//! # Data Flow
//! ```text
//! Dispatcher picked backend N
//!     → client.rs raises N:activeConnections
//!     → POST-style call to http://<addr>:<port>/process (fixed timeout)
//!     → client.rs lowers N:activeConnections
//!     → ForwardResponse (status, headers, body, latency) or ForwardError
//!
//! Health summary
//!     → client.rs ping: GET http://<addr>:<port> (short timeout)
//! ```
//!
//! # Design Decisions
//! - One attempt per request; no retries at this layer
//! - Latency covers the call only, not gauge bookkeeping
//! - Timeouts map to a distinct error so the front end can answer 504

pub mod client;

pub use client::{BackendClient, ForwardError, ForwardResponse};

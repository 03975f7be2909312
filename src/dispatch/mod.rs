//! Request intake and dispatch.
//!
//! # Data Flow
//! ```text
//! Front-end handler (one task per inbound call)
//!     → request.rs: PendingRequest + CompletionWaiter
//!     → intake.rs: submit (waits while the queue is full)
//!     → dispatcher.rs: single consumer, FIFO
//!         → strategy selects a backend
//!         → BackendClient forwards
//!         → completion fires (response or error)
//!         → metrics recorded on success
//!     → handler's CompletionWaiter resolves
//! ```
//!
//! # Design Decisions
//! - Selection and forwarding are serialized per pool
//! - A completion handle fires at most once; dropping it answers "abandoned"
//! - Metrics writes happen after the caller is answered and never fail a request

pub mod dispatcher;
pub mod intake;
pub mod request;

pub use dispatcher::Dispatcher;
pub use intake::{intake_queue, IntakeClosed, IntakeQueue, IntakeReceiver};
pub use request::{DispatchError, DispatchOutcome, PendingRequest};

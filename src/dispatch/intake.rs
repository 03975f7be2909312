//! Bounded intake queue between request handlers and the dispatcher.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use tokio::sync::mpsc;

use crate::dispatch::request::{DispatchError, DispatchOutcome, PendingRequest};

/// Returned when submitting to a queue whose consumer has closed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("intake queue is closed")]
pub struct IntakeClosed;

/// Create a queue holding at most `capacity` pending requests.
pub fn intake_queue(capacity: usize) -> (IntakeQueue, IntakeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (IntakeQueue { tx }, IntakeReceiver { rx })
}

/// Producer handle. Cheap to clone; one per request handler task.
#[derive(Debug, Clone)]
pub struct IntakeQueue {
    tx: mpsc::Sender<PendingRequest>,
}

impl IntakeQueue {
    /// Enqueue a request, waiting while the queue is full. Nothing is dropped
    /// for lack of space.
    pub async fn submit(&self, request: PendingRequest) -> Result<(), IntakeClosed> {
        self.tx.send(request).await.map_err(|_| IntakeClosed)
    }

    /// Submit a request and wait until the dispatcher has finished with it.
    pub async fn dispatch(
        &self,
        request_id: impl Into<String>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> DispatchOutcome {
        let (request, waiter) = PendingRequest::new(request_id, method, uri, headers, body);
        if self.submit(request).await.is_err() {
            return Err(DispatchError::Closed);
        }
        waiter.wait().await
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer handle, owned by exactly one dispatcher.
#[derive(Debug)]
pub struct IntakeReceiver {
    rx: mpsc::Receiver<PendingRequest>,
}

impl IntakeReceiver {
    /// Next request in FIFO order; `None` once closed and drained.
    pub async fn next_for_dispatch(&mut self) -> Option<PendingRequest> {
        self.rx.recv().await
    }

    /// Refuse new submissions. Requests already queued are still returned by
    /// `next_for_dispatch`.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

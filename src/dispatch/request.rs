//! Pending requests and their one-shot completion handle.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use tokio::sync::oneshot;

use crate::load_balancer::SelectError;
use crate::upstream::{ForwardError, ForwardResponse};

/// Why a request produced no backend response.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("backend selection failed: {0}")]
    Select(#[from] SelectError),
    #[error("forwarding to '{backend}' failed: {source}")]
    Forward {
        backend: String,
        #[source]
        source: ForwardError,
    },
    #[error("intake queue is closed")]
    Closed,
    #[error("request was dropped before dispatch finished")]
    Abandoned,
}

impl DispatchError {
    /// Status the front end answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::Forward {
                source: ForwardError::Timeout(_),
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Forward { .. } => StatusCode::BAD_GATEWAY,
            DispatchError::Select(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Closed | DispatchError::Abandoned => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Result delivered to the producer of a request.
pub type DispatchOutcome = Result<ForwardResponse, DispatchError>;

/// Write-once handle back to the producer.
///
/// `complete` consumes the handle, so it can fire at most once. A handle
/// dropped without firing delivers [`DispatchError::Abandoned`], so the
/// producer never waits forever.
#[derive(Debug)]
pub struct Completion {
    tx: Option<oneshot::Sender<DispatchOutcome>>,
}

impl Completion {
    pub fn complete(mut self, outcome: DispatchOutcome) {
        if let Some(tx) = self.tx.take() {
            // the producer may have gone away; nothing left to tell it
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(DispatchError::Abandoned));
        }
    }
}

/// Producer side of a [`Completion`].
#[derive(Debug)]
pub struct CompletionWaiter {
    rx: oneshot::Receiver<DispatchOutcome>,
}

impl CompletionWaiter {
    /// Wait until the dispatcher has finished with the request.
    pub async fn wait(self) -> DispatchOutcome {
        self.rx.await.unwrap_or(Err(DispatchError::Abandoned))
    }
}

/// Create a linked completion pair.
pub fn completion() -> (Completion, CompletionWaiter) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx: Some(tx) }, CompletionWaiter { rx })
}

/// One inbound request waiting for dispatch. The body is already fully read.
#[derive(Debug)]
pub struct PendingRequest {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub completion: Completion,
}

impl PendingRequest {
    pub fn new(
        request_id: impl Into<String>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> (Self, CompletionWaiter) {
        let (completion, waiter) = completion();
        let request = Self {
            request_id: request_id.into(),
            method,
            uri,
            headers,
            body,
            completion,
        };
        (request, waiter)
    }
}

//! Correlation registry for suspended input waits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::domain::RequestId;

/// A response type that correlates to a request by id and can be synthesized
/// when nobody answers. Implemented by both response tiers so one registry
/// serves processors and the manager alike.
pub trait Correlated: Send + 'static {
    fn request_id(&self) -> RequestId;

    /// Synthesized response for an abort sweep.
    fn make_canceled(request_id: RequestId) -> Self;

    /// Synthesized response for an elapsed timeout.
    fn make_timeout(request_id: RequestId) -> Self;
}

/// Registry of outstanding requests, keyed by id.
///
/// Protocol: `register` before emitting the request (so an answer can never
/// race past the waiter), then `wait`. Every wait resolves deterministically:
/// - `resolve` delivers the caller's answer,
/// - the timeout elapses and a timeout response is synthesized,
/// - `cancel_all` sweeps everything with canceled responses on abort.
///
/// The lock is a plain `std` mutex: critical sections only touch the map and
/// never await, so `resolve` is safe to call from non-async contexts too.
pub struct InputRegistry<R> {
    pending: Mutex<HashMap<RequestId, oneshot::Sender<R>>>,
}

impl<R: Correlated> InputRegistry<R> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register an outstanding request and get the receiving half.
    pub fn register(&self, request_id: RequestId) -> oneshot::Receiver<R> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("input registry lock poisoned")
            .insert(request_id, tx);
        rx
    }

    /// Deliver an answer. Returns false when no matching request is pending
    /// (already resolved, timed out, or never registered).
    pub fn resolve(&self, response: R) -> bool {
        let sender = self
            .pending
            .lock()
            .expect("input registry lock poisoned")
            .remove(&response.request_id());
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Sweep every outstanding request with a canceled response. Called on
    /// abort so no waiter is left dangling.
    pub fn cancel_all(&self) {
        let drained: Vec<(RequestId, oneshot::Sender<R>)> = self
            .pending
            .lock()
            .expect("input registry lock poisoned")
            .drain()
            .collect();
        for (request_id, tx) in drained {
            let _ = tx.send(R::make_canceled(request_id));
        }
    }

    /// Number of outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .expect("input registry lock poisoned")
            .len()
    }

    /// Await the answer for a registered request.
    ///
    /// With a timeout, an elapsed deadline synthesizes a timeout response and
    /// drops the stale registration; without one, the wait is bounded only by
    /// `resolve`/`cancel_all`.
    pub async fn wait(
        &self,
        request_id: RequestId,
        rx: oneshot::Receiver<R>,
        timeout: Option<Duration>,
    ) -> R {
        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(response)) => response,
                // Sender dropped without a value: treat as canceled.
                Ok(Err(_)) => R::make_canceled(request_id),
                Err(_elapsed) => {
                    self.pending
                        .lock()
                        .expect("input registry lock poisoned")
                        .remove(&request_id);
                    R::make_timeout(request_id)
                }
            },
            None => rx.await.unwrap_or_else(|_| R::make_canceled(request_id)),
        }
    }
}

impl<R: Correlated> Default for InputRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlated for super::UserInputResponse {
    fn request_id(&self) -> RequestId {
        self.request_id
    }

    fn make_canceled(request_id: RequestId) -> Self {
        Self::canceled(request_id)
    }

    fn make_timeout(request_id: RequestId) -> Self {
        Self::timeout(request_id)
    }
}

impl Correlated for super::QueueInputResponse {
    fn request_id(&self) -> RequestId {
        self.request_id
    }

    fn make_canceled(request_id: RequestId) -> Self {
        Self::canceled(request_id)
    }

    fn make_timeout(request_id: RequestId) -> Self {
        Self::timeout(request_id)
    }
}

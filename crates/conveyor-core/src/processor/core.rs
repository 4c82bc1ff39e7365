//! Shared processor plumbing.

use tokio::sync::broadcast;

use crate::domain::ProcessingEvent;
use crate::input::{InputRegistry, UserInputRequest, UserInputResponse};

/// Extra backlog on the event stream: late or slow subscribers may lag, the
/// emitting processor never blocks.
const EVENT_BUFFER: usize = 10;

/// Backlog on the input-request stream. Requests are rare (one suspension at
/// a time per processor), so a handful of slots is plenty.
const INPUT_REQUEST_BUFFER: usize = 3;

/// The plumbing every concrete processor embeds: progress-event fan-out,
/// input-request fan-out, and the correlated wait for answers.
///
/// Composition instead of a base class: a concrete processor holds a
/// `ProcessorCore<E>` field, delegates the stream accessors of
/// [`QueueProcessor`](crate::ports::QueueProcessor) to it, emits its started
/// event through [`emit`](Self::emit) as the first thing `process` does, and
/// suspends with [`request_input`](Self::request_input) when it needs the
/// outside world.
pub struct ProcessorCore<E> {
    events: broadcast::Sender<E>,
    input_requests: broadcast::Sender<UserInputRequest>,
    inputs: InputRegistry<UserInputResponse>,
}

impl<E: ProcessingEvent> ProcessorCore<E> {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (input_requests, _) = broadcast::channel(INPUT_REQUEST_BUFFER);
        Self {
            events,
            input_requests,
            inputs: InputRegistry::new(),
        }
    }

    pub fn events(&self) -> broadcast::Receiver<E> {
        self.events.subscribe()
    }

    pub fn user_input_requests(&self) -> broadcast::Receiver<UserInputRequest> {
        self.input_requests.subscribe()
    }

    /// Emit a progress event. Emission never fails and never blocks; with no
    /// subscriber the event is simply dropped.
    pub fn emit(&self, event: E) {
        let _ = self.events.send(event);
    }

    /// Raise an input request and suspend until a correlated response
    /// arrives, the request's timeout elapses (synthesized timeout response),
    /// or an abort sweeps the wait (synthesized canceled response).
    pub async fn request_input(&self, request: UserInputRequest) -> UserInputResponse {
        let request_id = request.id;
        let timeout = request.timeout;
        // Register before emitting so an immediate answer cannot race the
        // waiter.
        let rx = self.inputs.register(request_id);
        let _ = self.input_requests.send(request);
        self.inputs.wait(request_id, rx, timeout).await
    }

    /// Deliver an answer from the caller. Returns false when nothing was
    /// waiting for this id.
    pub fn provide_input(&self, response: UserInputResponse) -> bool {
        self.inputs.resolve(response)
    }

    /// Resolve every outstanding input request with a canceled response.
    /// Part of the abort path; idempotent.
    pub fn cancel_pending_inputs(&self) {
        self.inputs.cancel_all();
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<E> {
        self.events.clone()
    }

    pub(crate) fn input_request_sender(&self) -> broadcast::Sender<UserInputRequest> {
        self.input_requests.clone()
    }
}

impl<E: ProcessingEvent> Default for ProcessorCore<E> {
    fn default() -> Self {
        Self::new()
    }
}

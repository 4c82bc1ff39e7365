//! QueueProcessor port - the strategy that performs the actual work.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{ProcessingEvent, ProcessingResult, QueueItem};
use crate::input::{UserInputRequest, UserInputResponse};

/// Contract a domain implements to process queue items.
///
/// Lifecycle per item: `Idle -> Started -> {Running <-> AwaitingInput} ->
/// {Done | Failed | Aborted}`. `AwaitingInput` is entered by raising a
/// [`UserInputRequest`] and suspending on its correlated response; the
/// suspension is bounded by the request's timeout, never open-ended.
///
/// Boundary rules:
/// - `process` must emit a started event as its first observable effect and
///   translate every internal fault into [`ProcessingResult::Error`] -
///   nothing panics across this trait.
/// - `provide_input` must not block.
/// - `abort` resolves any outstanding input requests with canceled responses
///   (no caller is left waiting), is idempotent, and reports whether it
///   actually stopped work.
///
/// [`ProcessorCore`](crate::processor::ProcessorCore) supplies the stream and
/// suspension plumbing so concrete processors only write the work itself.
#[async_trait]
pub trait QueueProcessor<I, E>: Send + Sync
where
    I: QueueItem,
    E: ProcessingEvent,
{
    /// Subscribe to domain progress events. The stream is multicast with a
    /// small backlog (no replay): subscribers see events emitted after they
    /// subscribed, and a slow consumer lags rather than blocking the
    /// processor.
    fn events(&self) -> broadcast::Receiver<E>;

    /// Subscribe to input requests the processor raises mid-item.
    fn user_input_requests(&self) -> broadcast::Receiver<UserInputRequest>;

    /// Run exactly one item to completion or to a classified error.
    async fn process(&self, item: I) -> ProcessingResult;

    /// Deliver a correlated answer to an outstanding input request.
    async fn provide_input(&self, response: UserInputResponse);

    /// Request cancellation of in-flight work. `item` identifies what is
    /// being aborted where the implementation needs it (a dynamic processor
    /// resolves its delegate from it); `None` aborts whatever is active.
    async fn abort(&self, item: Option<I>) -> bool;
}

//! Processor event contract.

/// Contract for a domain's progress-event vocabulary
/// ("authenticating", "printing", "feeding paper", ...).
///
/// The engine only needs three things from an event type:
/// - a lifecycle `started` event, emitted as the first observable effect of
///   every `process` call,
/// - a lifecycle `canceled` event, emitted when an abort is requested,
/// - the ability to recognize a started event, so the dynamic processor can
///   deduplicate the one its delegate emits.
///
/// Events flow through a broadcast channel, hence `Clone`.
pub trait ProcessingEvent: Clone + Send + 'static {
    fn started() -> Self;

    fn canceled() -> Self;

    fn is_started(&self) -> bool;
}

use thiserror::Error;

/// Engine-internal error type.
///
/// Processing failures are not represented here: a processor reports them
/// through [`ProcessingResult::Error`](super::ProcessingResult) so the
/// manager never has to catch anything crossing the processor boundary.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("item not found: {0}")]
    ItemNotFound(String),
}

//! Externally observable processing state of a queue manager.

use super::item::QueueItem;
use super::result::{ProcessingError, ProcessingResult};

/// Snapshot of the manager's progress, published on every transition.
///
/// Each transition produces a new value; states are never mutated after
/// emission. Observers (a UI layer, the demo binary, tests) must match
/// exhaustively - missing a variant is a correctness bug, which is why this
/// is a closed enum rather than an open hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingState<I: QueueItem> {
    /// Nothing enqueued, nothing running.
    QueueIdle,

    /// `process` is running for this item.
    ItemProcessing(I),

    /// The failed item is about to be re-run in place.
    ItemRetrying(I),

    /// The item completed; carries the processor's result.
    ItemDone(I, ProcessingResult),

    /// The item failed; the manager is about to ask the caller what to do.
    ItemFailed(I, ProcessingError),

    /// The item was repositioned to the tail of the pending set.
    ItemSkipped(I),

    /// Processing was aborted; remaining items were marked canceled.
    QueueCanceled,

    /// The pending set drained completely.
    QueueDone,
}

impl<I: QueueItem> ProcessingState<I> {
    /// The item this state refers to, when there is one.
    pub fn item(&self) -> Option<&I> {
        match self {
            ProcessingState::ItemProcessing(item)
            | ProcessingState::ItemRetrying(item)
            | ProcessingState::ItemDone(item, _)
            | ProcessingState::ItemFailed(item, _)
            | ProcessingState::ItemSkipped(item) => Some(item),
            ProcessingState::QueueIdle
            | ProcessingState::QueueCanceled
            | ProcessingState::QueueDone => None,
        }
    }

    /// Is the whole queue finished (drained or aborted)?
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingState::QueueCanceled | ProcessingState::QueueDone
        )
    }
}

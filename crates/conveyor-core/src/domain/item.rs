//! Queue item contract and lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle tag of a queue item.
///
/// State transitions:
/// - Pending -> Processing -> Done
/// - Pending -> Processing -> Failed -> Pending (retry) | Canceled
/// - Pending -> Skipped (moved to the tail, back to Pending on re-pick)
///
/// Design note: an enum keeps matching exhaustive and invalid states
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueItemStatus {
    /// Waiting to be picked up by the drive loop.
    Pending,

    /// Currently being executed by the processor. At most one item per
    /// manager instance may be in this state.
    Processing,

    /// Successfully completed.
    Done,

    /// The last processing attempt returned an error.
    Failed,

    /// Repositioned to the tail of the pending set after a deferred retry.
    Skipped,

    /// Abandoned by an abort decision.
    Canceled,
}

impl QueueItemStatus {
    /// Every status, in declaration order. Used by storage implementations
    /// that keep one observable snapshot per status.
    pub const ALL: [QueueItemStatus; 6] = [
        QueueItemStatus::Pending,
        QueueItemStatus::Processing,
        QueueItemStatus::Done,
        QueueItemStatus::Failed,
        QueueItemStatus::Skipped,
        QueueItemStatus::Canceled,
    ];

    /// Is this a terminal status (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueItemStatus::Done | QueueItemStatus::Canceled)
    }

    /// Is this item part of the live queue (pending or processing)?
    pub fn is_active(self) -> bool {
        matches!(
            self,
            QueueItemStatus::Pending | QueueItemStatus::Processing
        )
    }
}

/// One unit of work submitted to the queue.
///
/// Each domain (payments, refunds, printing, tag operations) supplies its own
/// record type and implements this contract. The engine only relies on:
/// - a unique string id,
/// - an integer priority (higher runs first, ties broken by insertion order),
/// - a mutable status,
/// - a discriminator used by [`DynamicProcessor`] to pick a concrete
///   processor.
///
/// Status and priority mutation is owned by the manager; processors receive
/// clones and must not write back through storage.
///
/// [`DynamicProcessor`]: crate::processor::DynamicProcessor
pub trait QueueItem: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn priority(&self) -> i32;

    fn set_priority(&mut self, priority: i32);

    fn status(&self) -> QueueItemStatus;

    fn set_status(&mut self, status: QueueItemStatus);

    /// Discriminator that selects a concrete processor in a dynamic queue.
    fn processor_kind(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_active_do_not_overlap() {
        for status in QueueItemStatus::ALL {
            assert!(!(status.is_terminal() && status.is_active()));
        }
    }

    #[test]
    fn pending_and_processing_are_active() {
        assert!(QueueItemStatus::Pending.is_active());
        assert!(QueueItemStatus::Processing.is_active());
        assert!(!QueueItemStatus::Done.is_active());
        assert!(!QueueItemStatus::Canceled.is_active());
    }
}

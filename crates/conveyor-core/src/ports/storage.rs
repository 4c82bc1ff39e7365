//! QueueStorage port - persistence seam the manager relies on.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{QueueError, QueueItem, QueueItemStatus};

/// Persistence contract for queue items.
///
/// Guarantees the manager builds on:
/// - every mutating operation is durable before it returns,
/// - `get_next_pending` respects priority (highest first, ties broken by
///   insertion order),
/// - `observe_by_status` emits the full current set on every change, never a
///   diff, so subscribers can treat each emission as a snapshot.
///
/// The backing store (embedded database, file, memory) is irrelevant to the
/// engine's correctness; [`MemoryStorage`](crate::impls::MemoryStorage) is
/// the in-tree reference implementation.
#[async_trait]
pub trait QueueStorage<I: QueueItem>: Send + Sync {
    async fn insert(&self, item: I) -> Result<(), QueueError>;

    /// Replace the stored item with the same id.
    async fn update(&self, item: &I) -> Result<(), QueueError>;

    /// Highest-priority pending item, or `None` when the pending set is
    /// empty.
    async fn get_next_pending(&self) -> Result<Option<I>, QueueError>;

    async fn update_status(
        &self,
        item: &I,
        status: QueueItemStatus,
    ) -> Result<(), QueueError>;

    async fn remove(&self, item: &I) -> Result<(), QueueError>;

    async fn remove_by_status(
        &self,
        statuses: &[QueueItemStatus],
    ) -> Result<(), QueueError>;

    /// All items whose status is in `statuses`, in priority order.
    async fn get_all_by_status(
        &self,
        statuses: &[QueueItemStatus],
    ) -> Result<Vec<I>, QueueError>;

    /// Live view of all items with the given status.
    fn observe_by_status(&self, status: QueueItemStatus) -> watch::Receiver<Vec<I>>;
}

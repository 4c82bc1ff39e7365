//! In-memory queue storage.
//!
//! インメモリ実装。The reference [`QueueStorage`] backend: items live only
//! for the process lifetime. Useful for tests, demos, and deployments that
//! deliberately opt out of durability.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::trace;

use crate::domain::{QueueError, QueueItem, QueueItemStatus};
use crate::ports::QueueStorage;

struct Entry<I> {
    /// Insertion sequence, the tie-breaker within a priority.
    seq: u64,
    item: I,
}

struct Inner<I> {
    next_seq: u64,
    entries: Vec<Entry<I>>,
}

/// [`QueueStorage`] backed by a `Vec` behind an async mutex.
///
/// One watch channel per status is kept alive for the storage's lifetime, so
/// `observe_by_status` can hand out receivers without locking the item set.
pub struct MemoryStorage<I: QueueItem> {
    inner: Mutex<Inner<I>>,
    watchers: HashMap<QueueItemStatus, watch::Sender<Vec<I>>>,
}

impl<I: QueueItem> MemoryStorage<I> {
    pub fn new() -> Self {
        let watchers = QueueItemStatus::ALL
            .iter()
            .map(|status| (*status, watch::channel(Vec::new()).0))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                next_seq: 0,
                entries: Vec::new(),
            }),
            watchers,
        }
    }

    /// Push a fresh snapshot to every status watcher. Called with the lock
    /// held so snapshots never interleave.
    fn notify(&self, inner: &Inner<I>) {
        for (status, tx) in &self.watchers {
            let snapshot = by_status_sorted(inner, &[*status]);
            // send_replace stores the snapshot even while nobody subscribes,
            // so a late subscriber starts from the current state.
            tx.send_replace(snapshot);
        }
    }
}

impl<I: QueueItem> Default for MemoryStorage<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Items matching `statuses`, highest priority first, insertion order within
/// a priority.
fn by_status_sorted<I: QueueItem>(inner: &Inner<I>, statuses: &[QueueItemStatus]) -> Vec<I> {
    let mut matched: Vec<&Entry<I>> = inner
        .entries
        .iter()
        .filter(|e| statuses.contains(&e.item.status()))
        .collect();
    matched.sort_by(|a, b| {
        b.item
            .priority()
            .cmp(&a.item.priority())
            .then(a.seq.cmp(&b.seq))
    });
    matched.into_iter().map(|e| e.item.clone()).collect()
}

#[async_trait]
impl<I: QueueItem> QueueStorage<I> for MemoryStorage<I> {
    async fn insert(&self, item: I) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        trace!(item_id = item.id(), "insert");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push(Entry { seq, item });
        self.notify(&inner);
        Ok(())
    }

    async fn update(&self, item: &I) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.item.id() == item.id())
            .ok_or_else(|| QueueError::ItemNotFound(item.id().to_owned()))?;
        entry.item = item.clone();
        self.notify(&inner);
        Ok(())
    }

    async fn get_next_pending(&self) -> Result<Option<I>, QueueError> {
        let inner = self.inner.lock().await;
        Ok(by_status_sorted(&inner, &[QueueItemStatus::Pending])
            .into_iter()
            .next())
    }

    async fn update_status(&self, item: &I, status: QueueItemStatus) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.item.id() == item.id())
            .ok_or_else(|| QueueError::ItemNotFound(item.id().to_owned()))?;
        trace!(item_id = item.id(), ?status, "update_status");
        entry.item.set_status(status);
        self.notify(&inner);
        Ok(())
    }

    async fn remove(&self, item: &I) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len();
        inner.entries.retain(|e| e.item.id() != item.id());
        if inner.entries.len() == before {
            return Err(QueueError::ItemNotFound(item.id().to_owned()));
        }
        self.notify(&inner);
        Ok(())
    }

    async fn remove_by_status(&self, statuses: &[QueueItemStatus]) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        inner
            .entries
            .retain(|e| !statuses.contains(&e.item.status()));
        self.notify(&inner);
        Ok(())
    }

    async fn get_all_by_status(&self, statuses: &[QueueItemStatus]) -> Result<Vec<I>, QueueError> {
        let inner = self.inner.lock().await;
        Ok(by_status_sorted(&inner, statuses))
    }

    fn observe_by_status(&self, status: QueueItemStatus) -> watch::Receiver<Vec<I>> {
        self.watchers[&status].subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestItem {
        id: String,
        priority: i32,
        status: QueueItemStatus,
    }

    impl TestItem {
        fn new(id: &str, priority: i32) -> Self {
            Self {
                id: id.to_owned(),
                priority,
                status: QueueItemStatus::Pending,
            }
        }
    }

    impl QueueItem for TestItem {
        fn id(&self) -> &str {
            &self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn set_priority(&mut self, priority: i32) {
            self.priority = priority;
        }

        fn status(&self) -> QueueItemStatus {
            self.status
        }

        fn set_status(&mut self, status: QueueItemStatus) {
            self.status = status;
        }

        fn processor_kind(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn next_pending_is_highest_priority_then_insertion_order() {
        let storage = MemoryStorage::new();
        storage.insert(TestItem::new("low", 1)).await.unwrap();
        storage.insert(TestItem::new("high-a", 5)).await.unwrap();
        storage.insert(TestItem::new("high-b", 5)).await.unwrap();

        let next = storage.get_next_pending().await.unwrap().unwrap();
        assert_eq!(next.id, "high-a");
    }

    #[tokio::test]
    async fn status_change_moves_an_item_between_views() {
        let storage = MemoryStorage::new();
        let item = TestItem::new("a", 0);
        storage.insert(item.clone()).await.unwrap();

        storage
            .update_status(&item, QueueItemStatus::Done)
            .await
            .unwrap();

        assert!(storage.get_next_pending().await.unwrap().is_none());
        let done = storage
            .get_all_by_status(&[QueueItemStatus::Done])
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, "a");
    }

    #[tokio::test]
    async fn update_replaces_the_stored_item() {
        let storage = MemoryStorage::new();
        let mut item = TestItem::new("a", 1);
        storage.insert(item.clone()).await.unwrap();

        item.set_priority(9);
        storage.update(&item).await.unwrap();

        let next = storage.get_next_pending().await.unwrap().unwrap();
        assert_eq!(next.priority, 9);
    }

    #[tokio::test]
    async fn updating_an_unknown_item_is_an_error() {
        let storage = MemoryStorage::new();
        let err = storage.update(&TestItem::new("ghost", 0)).await.unwrap_err();
        assert!(matches!(err, QueueError::ItemNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn remove_by_status_drops_only_matching_items() {
        let storage = MemoryStorage::new();
        let done = TestItem::new("done", 0);
        storage.insert(done.clone()).await.unwrap();
        storage.insert(TestItem::new("pending", 0)).await.unwrap();
        storage
            .update_status(&done, QueueItemStatus::Done)
            .await
            .unwrap();

        storage
            .remove_by_status(&[QueueItemStatus::Done])
            .await
            .unwrap();

        let all = storage
            .get_all_by_status(&QueueItemStatus::ALL)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "pending");
    }

    #[tokio::test]
    async fn observers_see_full_snapshots_on_every_change() {
        let storage = MemoryStorage::new();
        let mut pending = storage.observe_by_status(QueueItemStatus::Pending);
        assert!(pending.borrow().is_empty());

        storage.insert(TestItem::new("a", 0)).await.unwrap();
        pending.changed().await.unwrap();
        assert_eq!(pending.borrow_and_update().len(), 1);

        storage.insert(TestItem::new("b", 0)).await.unwrap();
        pending.changed().await.unwrap();
        let ids: Vec<String> = pending
            .borrow_and_update()
            .iter()
            .map(|i| i.id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

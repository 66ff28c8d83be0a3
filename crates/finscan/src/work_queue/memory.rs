//! In-process work queue backed by a deque.
//!
//! Used by the CLI `run` command to drain a manifest and by tests. Locks are
//! never held across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ClaimId, WorkHandle, WorkItem, WorkQueue, WorkQueueError};

/// Default number of deliveries before an item is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 3;

#[derive(Default)]
struct QueueState {
    ready: VecDeque<(WorkItem, u32)>,
    in_flight: HashMap<u64, (WorkItem, u32)>,
    dead_letter: Vec<(WorkItem, String)>,
    completed: u64,
    next_tag: u64,
}

/// A FIFO queue with redelivery and dead-lettering.
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    max_deliveries: u32,
}

impl MemoryQueue {
    pub fn new(max_deliveries: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            max_deliveries: max_deliveries.max(1),
        }
    }

    pub fn from_items(items: impl IntoIterator<Item = WorkItem>, max_deliveries: u32) -> Self {
        let queue = Self::new(max_deliveries);
        for item in items {
            queue.push(item);
        }
        queue
    }

    pub fn push(&self, item: WorkItem) {
        self.lock().ready.push_back((item, 0));
    }

    /// Items that exhausted their deliveries or were failed without requeue.
    pub fn dead_letters(&self) -> Vec<(WorkItem, String)> {
        self.lock().dead_letter.clone()
    }

    pub fn completed(&self) -> u64 {
        self.lock().completed
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        // A poisoned lock only means another worker panicked mid-update;
        // the deque itself is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_in_flight(
        &self,
        state: &mut QueueState,
        claim_id: ClaimId,
    ) -> Result<(WorkItem, u32), WorkQueueError> {
        match claim_id {
            ClaimId::DeliveryTag(tag) => state
                .in_flight
                .remove(&tag)
                .ok_or(WorkQueueError::UnknownDelivery(tag)),
            ClaimId::None => Err(WorkQueueError::HandleConsumed),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELIVERIES)
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn receive(&self) -> Result<Option<WorkHandle>, WorkQueueError> {
        let mut state = self.lock();
        let Some((item, deliveries)) = state.ready.pop_front() else {
            return Ok(None);
        };
        let tag = state.next_tag;
        state.next_tag += 1;
        let delivery = deliveries + 1;
        state.in_flight.insert(tag, (item.clone(), delivery));
        Ok(Some(WorkHandle::new(
            item,
            ClaimId::DeliveryTag(tag),
            delivery,
        )))
    }

    async fn complete(&self, handle: WorkHandle) -> Result<(), WorkQueueError> {
        let (_, claim_id) = handle.consume();
        let mut state = self.lock();
        self.take_in_flight(&mut state, claim_id)?;
        state.completed += 1;
        Ok(())
    }

    async fn fail(
        &self,
        handle: WorkHandle,
        error: &str,
        requeue: bool,
    ) -> Result<(), WorkQueueError> {
        let (_, claim_id) = handle.consume();
        let mut state = self.lock();
        let (item, deliveries) = self.take_in_flight(&mut state, claim_id)?;
        if requeue && deliveries < self.max_deliveries {
            tracing::debug!(
                "Requeueing {} after delivery {}: {}",
                item.document_id,
                deliveries,
                error
            );
            state.ready.push_back((item, deliveries));
        } else {
            tracing::warn!("Dead-lettering {}: {}", item.document_id, error);
            state.dead_letter.push((item, error.to_string()));
        }
        Ok(())
    }

    async fn pending(&self) -> Result<u64, WorkQueueError> {
        Ok(self.lock().ready.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> WorkItem {
        WorkItem {
            document_id: id.to_string(),
            object_key: format!("raw/{}.pdf", id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fifo_receive_and_complete() {
        let queue = MemoryQueue::from_items([item("a"), item("b")], 3);
        assert_eq!(queue.pending().await.unwrap(), 2);

        let first = queue.receive().await.unwrap().unwrap();
        assert_eq!(first.item().document_id, "a");
        assert_eq!(first.delivery, 1);
        assert_eq!(queue.in_flight(), 1);

        queue.complete(first).await.unwrap();
        assert_eq!(queue.completed(), 1);
        assert_eq!(queue.in_flight(), 0);

        let second = queue.receive().await.unwrap().unwrap();
        assert_eq!(second.item().document_id, "b");
        queue.complete(second).await.unwrap();
        assert!(queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_requeue_until_dead_letter() {
        let queue = MemoryQueue::from_items([item("a")], 2);

        let h = queue.receive().await.unwrap().unwrap();
        queue.fail(h, "storage timeout", true).await.unwrap();
        assert_eq!(queue.pending().await.unwrap(), 1);

        let h = queue.receive().await.unwrap().unwrap();
        assert_eq!(h.delivery, 2);
        queue.fail(h, "storage timeout", true).await.unwrap();

        assert_eq!(queue.pending().await.unwrap(), 0);
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].0.document_id, "a");
        assert_eq!(dead[0].1, "storage timeout");
    }

    #[tokio::test]
    async fn test_fail_without_requeue() {
        let queue = MemoryQueue::from_items([item("a")], 5);
        let h = queue.receive().await.unwrap().unwrap();
        queue.fail(h, "bad item", false).await.unwrap();
        assert_eq!(queue.dead_letters().len(), 1);
        assert_eq!(queue.pending().await.unwrap(), 0);
    }
}

//! A received work item paired with the delivery it arrived on.

use super::WorkItem;

/// Opaque claim identifier used by queue backends to track ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimId {
    /// Delivery tag assigned by the queue.
    DeliveryTag(u64),
    /// Already handed back to the queue.
    None,
}

/// A received work item. Move semantics: consumed by `complete()` or `fail()`.
///
/// If dropped without being consumed, logs a warning; the external queue's
/// redelivery is the real safety net.
pub struct WorkHandle {
    item: WorkItem,
    claim_id: ClaimId,
    /// 1-based delivery count for this item.
    pub delivery: u32,
    consumed: bool,
}

impl WorkHandle {
    pub fn new(item: WorkItem, claim_id: ClaimId, delivery: u32) -> Self {
        Self {
            item,
            claim_id,
            delivery,
            consumed: false,
        }
    }

    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    pub fn claim_id(&self) -> ClaimId {
        self.claim_id
    }

    /// Mark this handle as consumed (called by queue backends in complete/fail).
    pub fn consume(mut self) -> (WorkItem, ClaimId) {
        self.consumed = true;
        let item = std::mem::take(&mut self.item);
        let claim_id = std::mem::replace(&mut self.claim_id, ClaimId::None);
        (item, claim_id)
    }
}

impl Drop for WorkHandle {
    fn drop(&mut self) {
        if !self.consumed {
            tracing::warn!(
                "WorkHandle for {} dropped without being completed or failed",
                self.item.document_id
            );
        }
    }
}

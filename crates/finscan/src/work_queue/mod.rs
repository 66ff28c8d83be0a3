//! Work queue abstraction for the receive/complete/fail lifecycle.
//!
//! Delivery and redelivery semantics belong to the external queue; the
//! extraction service only receives items, acknowledges them once a record
//! has been written, and fails them (optionally requeueing) on transient
//! errors.

mod error;
mod handle;
mod memory;

pub use error::WorkQueueError;
pub use handle::{ClaimId, WorkHandle};
pub use memory::MemoryQueue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::TemplateType;

/// One unit of work: a document waiting for extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub document_id: String,
    /// Object-storage key of the raw bytes.
    pub object_key: String,
    /// Optional template-type hint (e.g. "transaction_report").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_hint: Option<String>,
    /// Caller authorized paid cloud recognition for this document.
    #[serde(default)]
    pub cloud_authorized: bool,
}

impl WorkItem {
    /// Parsed template hint; unknown names are ignored.
    pub fn template_type_hint(&self) -> Option<TemplateType> {
        self.template_hint
            .as_deref()
            .and_then(TemplateType::from_str)
            .filter(|t| *t != TemplateType::Unknown)
    }

    /// Parse a JSON-lines manifest, one work item per non-empty line.
    pub fn parse_manifest(content: &str) -> Result<Vec<WorkItem>, WorkQueueError> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
            .map(|(idx, line)| {
                serde_json::from_str::<WorkItem>(line).map_err(|e| WorkQueueError::Manifest {
                    line: idx + 1,
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

/// A queue that manages the receive/complete/fail lifecycle for work items.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Receive the next available item, or `None` if the queue is drained.
    async fn receive(&self) -> Result<Option<WorkHandle>, WorkQueueError>;

    /// Acknowledge a processed item.
    async fn complete(&self, handle: WorkHandle) -> Result<(), WorkQueueError>;

    /// Negatively acknowledge an item. With `requeue` the queue may redeliver
    /// it; otherwise (or once redeliveries run out) it is dead-lettered.
    async fn fail(
        &self,
        handle: WorkHandle,
        error: &str,
        requeue: bool,
    ) -> Result<(), WorkQueueError>;

    /// Items waiting for delivery.
    async fn pending(&self) -> Result<u64, WorkQueueError>;
}

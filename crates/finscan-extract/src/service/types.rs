//! Extraction service events and results.

use finscan::models::FinalStatus;

/// Events emitted while the service drains its queue.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    /// Workers spawned
    Started { workers: usize, pending: u64 },
    /// A worker took a document off the queue
    DocumentStarted {
        worker_id: usize,
        document_id: String,
        delivery: u32,
    },
    /// Record and text written, item acknowledged
    DocumentFinished {
        worker_id: usize,
        document_id: String,
        status: FinalStatus,
        aggregate_confidence: f64,
    },
    /// Raw bytes could not be fetched or outputs could not be written
    DocumentFailed {
        worker_id: usize,
        document_id: String,
        error: String,
        requeued: bool,
    },
}

/// Counts for one service run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSummary {
    pub complete: usize,
    pub manual_review: usize,
    pub validation_failed: usize,
    /// Failed back to the queue for redelivery.
    pub requeued: usize,
    /// Failed without requeue (missing or invalid object keys).
    pub dead_lettered: usize,
}

impl ServiceSummary {
    /// Documents that reached a finalized record.
    pub fn processed(&self) -> usize {
        self.complete + self.manual_review + self.validation_failed
    }

    pub(crate) fn record(&mut self, status: FinalStatus) {
        match status {
            FinalStatus::Complete => self.complete += 1,
            FinalStatus::RequiresManualReview => self.manual_review += 1,
            FinalStatus::ValidationFailed => self.validation_failed += 1,
        }
    }

    pub(crate) fn merge(&mut self, other: &ServiceSummary) {
        self.complete += other.complete;
        self.manual_review += other.manual_review;
        self.validation_failed += other.validation_failed;
        self.requeued += other.requeued;
        self.dead_lettered += other.dead_lettered;
    }
}

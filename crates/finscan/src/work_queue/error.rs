use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkQueueError {
    /// Acknowledged a delivery the queue no longer holds.
    #[error("Delivery {0} is not in flight")]
    UnknownDelivery(u64),
    #[error("Work handle was already completed or failed")]
    HandleConsumed,
    #[error("Manifest line {line}: {message}")]
    Manifest { line: usize, message: String },
}

//! Error types for the extraction engine.
//!
//! Insufficient text yield is deliberately absent: it is an attempt outcome
//! that drives escalation, not a failure.

use finscan::budget::BudgetError;
use thiserror::Error;

/// Document-level failure taxonomy.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Download or recognition-call failure; retried with backoff.
    #[error("Transient I/O failure: {0}")]
    TransientIo(String),

    /// Bytes no reader understands. Fatal for the document, never retried.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Cloud escalation refused by the budget provider.
    #[error("Cloud escalation blocked: {0}")]
    BudgetExhausted(#[from] BudgetError),

    /// A required field failed its schema constraint.
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Cancelled before {0} stage")]
    Cancelled(&'static str),
}

impl EngineError {
    /// Whether the work item should be redelivered.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::TransientIo(_))
    }
}

/// Errors from document readers.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{0} not found (install poppler-utils)")]
    ToolNotFound(&'static str),

    #[error("Unreadable document: {0}")]
    Unreadable(String),

    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Page {0} has no raster representation")]
    NoRaster(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ReaderError> for EngineError {
    fn from(err: ReaderError) -> Self {
        match err {
            ReaderError::Unreadable(msg) => EngineError::UnsupportedFormat(msg),
            other => EngineError::TransientIo(other.to_string()),
        }
    }
}

/// Page-level preprocessing failure. The page is skipped for local OCR.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode page image: {0}")]
    Decode(String),

    #[error("Failed to encode page image: {0}")]
    Encode(String),
}

//! finscan-extract - the document extraction engine.
//!
//! Raw bytes go through classification, the text acquisition cascade
//! (native text, local OCR, budget-gated cloud OCR), template-driven field
//! extraction, scoring and schema validation, and come out as an
//! [`finscan::models::ExtractionRecord`] with a full audit trail.

// Backend and template types use `from_str` methods that return Option<Self>.
#![allow(clippy::should_implement_trait)]

pub mod acquisition;
pub mod audit;
pub mod classifier;
pub mod document;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod normalize;
pub mod ocr;
pub mod preprocess;
pub mod scoring;
pub mod service;
pub mod templates;
pub mod validation;

pub use acquisition::CancellationFlag;
pub use engine::{ExtractionEngine, ExtractionOutput, ExtractionRequest};
pub use error::EngineError;
pub use service::{ExtractionService, ServiceEvent, ServiceSummary};

//! Domain models for disclosure extraction.

mod attempt;
mod classification;
mod document;
mod field;
mod record;
mod template;

pub use attempt::{AttemptOutcome, ExtractionAttempt, ExtractionMethod};
pub use classification::{ClassificationResult, PageVerdict, TemplateSource, TextAvailability};
pub use document::{DocumentFormat, DocumentHandle, DocumentProperties};
pub use field::{AmountRange, FieldData, FieldValue, MatchEvidence, TransactionRecord, ValueType};
pub use record::{
    round4, AttemptSummary, AuditMetadata, ClassificationSummary, ExtractionRecord, FinalStatus,
    Stage, ValidationCheck, ValidationResult,
};
pub use template::TemplateType;

//! Final output record and its audit metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    AttemptOutcome, ClassificationResult, DocumentProperties, ExtractionAttempt, ExtractionMethod,
    FieldData, TemplateType, TextAvailability, TransactionRecord,
};

/// Terminal sub-state of a finalized document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Complete,
    RequiresManualReview,
    ValidationFailed,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Complete => "complete",
            FinalStatus::RequiresManualReview => "requires_manual_review",
            FinalStatus::ValidationFailed => "validation_failed",
        }
    }
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing stage, used for the per-stage timing breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Open,
    Classify,
    Acquire,
    Extract,
    Score,
    Validate,
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Open,
        Stage::Classify,
        Stage::Acquire,
        Stage::Extract,
        Stage::Score,
        Stage::Validate,
        Stage::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Open => "open",
            Stage::Classify => "classify",
            Stage::Acquire => "acquire",
            Stage::Extract => "extract",
            Stage::Score => "score",
            Stage::Validate => "validate",
            Stage::Finalize => "finalize",
        }
    }
}

/// Outcome of one schema constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationCheck {
    pub constraint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub passed: bool,
    pub blocking: bool,
}

/// Schema and business-rule validation outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub checks: Vec<ValidationCheck>,
    /// Non-blocking findings (business rules, optional-field schema failures).
    pub warnings: Vec<String>,
    /// Blocking findings (schema failures on required fields).
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn is_blocking(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Round to four decimals so scores serialize identically on every run.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Attempt as written to `audit.extraction_attempts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptSummary {
    pub method: ExtractionMethod,
    pub pages: Vec<u32>,
    pub text_len: usize,
    pub yield_quality: f64,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AttemptSummary {
    pub fn from_attempt(attempt: &ExtractionAttempt, include_timestamp: bool) -> Self {
        Self {
            method: attempt.method,
            pages: attempt.pages.clone(),
            text_len: attempt.text_len,
            yield_quality: round4(attempt.yield_quality),
            outcome: attempt.outcome,
            detail: attempt.detail.clone(),
            timestamp: include_timestamp.then_some(attempt.timestamp),
        }
    }
}

/// Classifier verdict as written to the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub verdict: TextAvailability,
    pub template_type: TemplateType,
    pub confidence: f64,
    pub image_pages: Vec<u32>,
}

impl ClassificationSummary {
    pub fn from_result(result: &ClassificationResult) -> Self {
        Self {
            verdict: result.verdict,
            template_type: result.template_type,
            confidence: round4(result.confidence),
            image_pages: result.image_pages(),
        }
    }
}

/// Audit trail embedded in every output record, whatever the terminal status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditMetadata {
    pub document_properties: DocumentProperties,
    pub classification: ClassificationSummary,
    pub extraction_attempts: Vec<AttemptSummary>,
    pub field_confidence: BTreeMap<String, f64>,
    pub aggregate_confidence: f64,
    pub completeness_pct: f64,
    pub suspicious_patterns: Vec<String>,
    pub validation_warnings: Vec<String>,
    pub validation_errors: Vec<String>,
    /// Terminal-path notes (unsupported input, cancellation, review reasons).
    pub notes: Vec<String>,
    /// Milliseconds per stage. Every stage is listed; values stay zero
    /// unless timings are enabled, so default output is reproducible.
    pub processing_ms: BTreeMap<String, u64>,
}

/// The structured record produced for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRecord {
    pub document_id: String,
    pub template_type: TemplateType,
    pub status: FinalStatus,
    pub fields: BTreeMap<String, Option<FieldData>>,
    pub transactions: Vec<TransactionRecord>,
    pub audit: AuditMetadata,
}

impl ExtractionRecord {
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&FinalStatus::RequiresManualReview).unwrap(),
            "\"requires_manual_review\""
        );
    }
}

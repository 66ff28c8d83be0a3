//! Text acquisition attempts, recorded in escalation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text acquisition tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Text embedded in the document (free, fastest).
    NativeText,
    /// Local optical recognition after preprocessing (free, slower).
    LocalOcr,
    /// Paid cloud recognition, gated on authorization and budget.
    CloudOcr,
}

impl ExtractionMethod {
    /// Escalation tier, starting at 0.
    pub fn tier(&self) -> u8 {
        match self {
            ExtractionMethod::NativeText => 0,
            ExtractionMethod::LocalOcr => 1,
            ExtractionMethod::CloudOcr => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::NativeText => "native_text",
            ExtractionMethod::LocalOcr => "local_ocr",
            ExtractionMethod::CloudOcr => "cloud_ocr",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "native_text" | "native" => Some(ExtractionMethod::NativeText),
            "local_ocr" | "local" => Some(ExtractionMethod::LocalOcr),
            "cloud_ocr" | "cloud" => Some(ExtractionMethod::CloudOcr),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed outcome of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// Ran, but yield quality stayed below the tier minimum.
    Insufficient,
    /// Every call at this tier failed (after retries).
    Error,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Insufficient => "insufficient",
            AttemptOutcome::Error => "error",
        }
    }
}

/// One tier's attempt at acquiring text for a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionAttempt {
    pub method: ExtractionMethod,
    /// 1-based pages this tier processed.
    pub pages: Vec<u32>,
    /// Characters of text this tier produced.
    pub text_len: usize,
    /// Yield quality of the best-available document text after this tier.
    pub yield_quality: f64,
    pub timestamp: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    /// Free-form note (skipped pages, last error).
    pub detail: Option<String>,
}

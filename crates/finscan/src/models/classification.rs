//! Classifier output: per-page text availability and the detected template.

use serde::{Deserialize, Serialize};

use super::TemplateType;

/// Whether a page (or document) carries extractable native text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAvailability {
    Native,
    Image,
    Mixed,
    /// The bytes could not be opened at all.
    Unsupported,
}

impl TextAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAvailability::Native => "native",
            TextAvailability::Image => "image",
            TextAvailability::Mixed => "mixed",
            TextAvailability::Unsupported => "unsupported",
        }
    }
}

/// How the template type was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// Caller-supplied hint.
    Hint,
    /// Structural markers found in native text.
    Markers,
    /// No usable native text; detection runs after text acquisition.
    Deferred,
    /// Native text present but no template markers matched.
    Undetected,
}

/// Verdict for a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVerdict {
    /// 1-based page number.
    pub page: u32,
    /// Non-whitespace characters of native text on the page.
    pub native_chars: usize,
    pub availability: TextAvailability,
}

/// Result of classifying one document. Created once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub pages: Vec<PageVerdict>,
    pub verdict: TextAvailability,
    pub template_type: TemplateType,
    pub template_source: TemplateSource,
    /// Fraction of pages agreeing with the majority page verdict.
    pub confidence: f64,
}

impl ClassificationResult {
    /// Classification for bytes that could not be opened.
    pub fn unsupported(template_hint: Option<TemplateType>) -> Self {
        Self {
            pages: Vec::new(),
            verdict: TextAvailability::Unsupported,
            template_type: template_hint.unwrap_or(TemplateType::Unknown),
            template_source: if template_hint.is_some() {
                TemplateSource::Hint
            } else {
                TemplateSource::Undetected
            },
            confidence: 0.0,
        }
    }

    /// Pages whose native text fell below the minimum-character threshold.
    pub fn image_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|p| p.availability == TextAvailability::Image)
            .map(|p| p.page)
            .collect()
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }
}

//! Text acquisition cascade.
//!
//! Tiers are evaluated in order (native text, local OCR, cloud OCR) by a
//! small state machine. Each tier is scored on the text it returned for the
//! pages it was given, and that score alone decides its outcome. The next
//! tier runs only when the previous attempt fell short, and only on the pages
//! where that attempt's own text stayed below the minimum. The cloud tier is
//! additionally gated on caller authorization and an atomic budget
//! reservation. The best text seen for each page, whichever tier produced
//! it, becomes the document text.

mod cancel;
mod quality;
mod runner;

pub use cancel::CancellationFlag;
pub use quality::yield_quality;
pub use runner::{recognize_page, recognize_with_retry, PageFailure, RetryPolicy};

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use chrono::Utc;
use finscan::budget::BudgetProvider;
use finscan::config::AcquisitionConfig;
use finscan::models::{AttemptOutcome, ExtractionAttempt, ExtractionMethod};

use crate::document::DocumentReader;
use crate::error::EngineError;
use crate::normalize::normalize_text;
use crate::ocr::OcrBackend;
use crate::preprocess::Preprocessor;

/// Ordered escalation policy for one tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPolicy {
    pub method: ExtractionMethod,
    pub min_yield: f64,
}

impl TierPolicy {
    /// The full cascade, cheapest tier first.
    pub fn cascade(config: &AcquisitionConfig) -> [TierPolicy; 3] {
        [
            ExtractionMethod::NativeText,
            ExtractionMethod::LocalOcr,
            ExtractionMethod::CloudOcr,
        ]
        .map(|method| TierPolicy {
            method,
            min_yield: config.min_yield(method),
        })
    }
}

/// Best text known for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredPage {
    pub page: u32,
    pub text: String,
    pub method: ExtractionMethod,
    pub yield_quality: f64,
}

/// Result of running the cascade on one document.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionOutcome {
    /// Best text per page, in page order.
    pub pages: Vec<AcquiredPage>,
    /// Attempts in escalation order.
    pub attempts: Vec<ExtractionAttempt>,
    /// The last tier met its minimum yield.
    pub sufficient: bool,
    /// Cancellation was observed between tiers.
    pub cancelled: bool,
    /// Skipped pages, blocked escalations and similar audit notes.
    pub notes: Vec<String>,
}

impl AcquisitionOutcome {
    pub fn final_yield(&self) -> f64 {
        self.attempts.last().map_or(0.0, |a| a.yield_quality)
    }

    /// Normalized document text with page provenance.
    pub fn text(&self) -> AcquiredText {
        AcquiredText::from_pages(&self.pages)
    }
}

/// Normalized document text plus the tier that produced each span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquiredText {
    pub text: String,
    spans: Vec<(Range<usize>, ExtractionMethod)>,
}

impl AcquiredText {
    pub fn from_pages(pages: &[AcquiredPage]) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(pages.len());
        for page in pages {
            let normalized = normalize_text(&page.text);
            if normalized.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push('\n');
            }
            let start = text.len();
            text.push_str(&normalized);
            spans.push((start..text.len(), page.method));
        }
        Self { text, spans }
    }

    /// Tier that produced the text at byte `offset`.
    pub fn method_at(&self, offset: usize) -> Option<ExtractionMethod> {
        self.spans
            .iter()
            .find(|(range, _)| range.contains(&offset))
            .map(|(_, method)| *method)
    }
}

/// Cloud escalation permission for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudAuthorization {
    Authorized,
    NotAuthorized,
}

impl From<bool> for CloudAuthorization {
    fn from(authorized: bool) -> Self {
        if authorized {
            CloudAuthorization::Authorized
        } else {
            CloudAuthorization::NotAuthorized
        }
    }
}

/// Runs the cascade for one document at a time.
pub struct TextAcquisition {
    config: AcquisitionConfig,
    local: Option<Arc<dyn OcrBackend>>,
    cloud: Option<Arc<dyn OcrBackend>>,
    budget: Arc<dyn BudgetProvider>,
    preprocessor: Preprocessor,
}

impl TextAcquisition {
    pub fn new(config: AcquisitionConfig, budget: Arc<dyn BudgetProvider>) -> Self {
        Self {
            config,
            local: None,
            cloud: None,
            budget,
            preprocessor: Preprocessor::default(),
        }
    }

    pub fn with_local_backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    pub fn with_cloud_backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.cloud = Some(backend);
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Run the cascade.
    ///
    /// `native_text` holds the embedded text of every page, already read by
    /// the caller (empty strings for raster pages).
    pub async fn acquire(
        &self,
        reader: Arc<dyn DocumentReader>,
        native_text: Vec<String>,
        authorization: CloudAuthorization,
        cancel: &CancellationFlag,
    ) -> AcquisitionOutcome {
        let page_count = reader.handle().page_count;
        let document_id = reader.handle().id.clone();
        let mut state = CascadeState::new(self.config.chars_per_page_target);
        let mut outcome = AcquisitionOutcome::default();
        let tiers = TierPolicy::cascade(&self.config);

        let mut pending: Vec<u32> = (1..=page_count).collect();
        let mut weak_pages: Vec<u32> = Vec::new();
        let mut scratch: Option<tempfile::TempDir> = None;

        for (index, tier) in tiers.iter().enumerate() {
            if index > 0 {
                if cancel.is_cancelled() {
                    tracing::info!("Document {} cancelled during text acquisition", document_id);
                    outcome.cancelled = true;
                    break;
                }
                let Some(previous) = outcome.attempts.last() else {
                    break;
                };
                if previous.outcome == AttemptOutcome::Success {
                    break;
                }
                let previous_tier = tiers[index - 1];
                if !weak_pages.is_empty() {
                    pending = std::mem::take(&mut weak_pages);
                }
                tracing::debug!(
                    "Document {}: {} yield {:.3} below minimum {:.2}, escalating {} page(s) to {}",
                    document_id,
                    previous_tier.method,
                    previous.yield_quality,
                    previous_tier.min_yield,
                    pending.len(),
                    tier.method
                );
            }

            let mut tier_text = TierText::default();
            let mut attempt = match tier.method {
                ExtractionMethod::NativeText => {
                    self.native_tier(&native_text, &pending, &mut tier_text)
                }
                ExtractionMethod::LocalOcr => {
                    let Some(backend) = self.local.clone() else {
                        outcome
                            .notes
                            .push("local recognition skipped: no backend configured".to_string());
                        break;
                    };
                    let preprocessor = self.config.preprocess.then(|| self.preprocessor.clone());
                    self.ocr_tier(
                        &reader,
                        backend,
                        *tier,
                        &pending,
                        preprocessor,
                        &mut scratch,
                        &mut tier_text,
                        &mut outcome.notes,
                    )
                    .await
                }
                ExtractionMethod::CloudOcr => {
                    let Some(backend) = self.authorize_cloud(authorization, &pending, &mut outcome)
                    else {
                        break;
                    };
                    self.ocr_tier(
                        &reader,
                        backend,
                        *tier,
                        &pending,
                        None,
                        &mut scratch,
                        &mut tier_text,
                        &mut outcome.notes,
                    )
                    .await
                }
            };

            let target = self.config.chars_per_page_target;
            attempt.yield_quality = tier_text.yield_over(&pending, target);
            if attempt.outcome != AttemptOutcome::Error {
                attempt.outcome = if attempt.yield_quality >= tier.min_yield {
                    AttemptOutcome::Success
                } else {
                    AttemptOutcome::Insufficient
                };
            }
            weak_pages = tier_text.pages_below(&pending, tier.min_yield, target);
            for (page, text) in tier_text.into_pages() {
                state.offer(page, text, tier.method);
            }

            tracing::debug!(
                "Document {}: {} attempt on {} page(s) -> {} (yield {:.3})",
                document_id,
                attempt.method,
                attempt.pages.len(),
                attempt.outcome.as_str(),
                attempt.yield_quality
            );
            outcome.attempts.push(attempt);
        }

        outcome.sufficient = !outcome.cancelled
            && outcome
                .attempts
                .last()
                .is_some_and(|a| a.outcome == AttemptOutcome::Success);
        outcome.pages = state.into_pages();
        outcome
    }

    /// Embedded text for `pages`. Outcome and yield are filled in by the caller.
    fn native_tier(
        &self,
        native_text: &[String],
        pages: &[u32],
        tier_text: &mut TierText,
    ) -> ExtractionAttempt {
        let mut text_len = 0;
        for &page in pages {
            let text = native_text
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default();
            text_len += text.chars().count();
            tier_text.record(page, text);
        }
        ExtractionAttempt {
            method: ExtractionMethod::NativeText,
            pages: pages.to_vec(),
            text_len,
            yield_quality: 0.0,
            timestamp: Utc::now(),
            outcome: AttemptOutcome::Insufficient,
            detail: None,
        }
    }

    /// Check authorization, backend and budget. Returns the backend only when
    /// the pages were reserved.
    fn authorize_cloud(
        &self,
        authorization: CloudAuthorization,
        pages: &[u32],
        outcome: &mut AcquisitionOutcome,
    ) -> Option<Arc<dyn OcrBackend>> {
        if authorization == CloudAuthorization::NotAuthorized {
            outcome.notes.push(format!(
                "cloud recognition not authorized; {} page(s) below local minimum",
                pages.len()
            ));
            return None;
        }
        let Some(backend) = self.cloud.clone() else {
            outcome
                .notes
                .push("cloud recognition skipped: no backend configured".to_string());
            return None;
        };
        if !backend.is_available() {
            outcome.notes.push(format!(
                "cloud recognition unavailable: {}",
                backend.availability_hint()
            ));
            return None;
        }
        match self.budget.try_reserve(pages.len() as u64) {
            Ok(remaining) => {
                tracing::info!(
                    "Reserved {} cloud page(s), {} remaining",
                    pages.len(),
                    remaining
                );
                Some(backend)
            }
            Err(e) => {
                let blocked = EngineError::from(e);
                tracing::warn!("{}", blocked);
                outcome.notes.push(blocked.to_string());
                None
            }
        }
    }

    /// Recognize `pages` with `backend`. The attempt comes back as `Error`
    /// when no page was recognized; otherwise the caller scores it.
    #[allow(clippy::too_many_arguments)]
    async fn ocr_tier(
        &self,
        reader: &Arc<dyn DocumentReader>,
        backend: Arc<dyn OcrBackend>,
        tier: TierPolicy,
        pages: &[u32],
        preprocessor: Option<Preprocessor>,
        scratch: &mut Option<tempfile::TempDir>,
        tier_text: &mut TierText,
        notes: &mut Vec<String>,
    ) -> ExtractionAttempt {
        let mut attempt = ExtractionAttempt {
            method: tier.method,
            pages: pages.to_vec(),
            text_len: 0,
            yield_quality: 0.0,
            timestamp: Utc::now(),
            outcome: AttemptOutcome::Error,
            detail: None,
        };

        if !backend.is_available() {
            attempt.detail = Some(format!(
                "{} unavailable: {}",
                backend.backend_type(),
                backend.availability_hint()
            ));
            return attempt;
        }

        if scratch.is_none() {
            match tempfile::tempdir() {
                Ok(dir) => *scratch = Some(dir),
                Err(e) => {
                    attempt.detail = Some(format!("scratch directory unavailable: {}", e));
                    return attempt;
                }
            }
        }
        let Some(dir) = scratch.as_ref().map(|d| d.path().to_path_buf()) else {
            return attempt;
        };

        let policy = RetryPolicy::from_config(&self.config);
        let mut recognized = 0;
        let mut last_error = None;
        for &page in pages {
            match recognize_page(
                reader.clone(),
                backend.clone(),
                page,
                dir.clone(),
                preprocessor.clone(),
                policy,
            )
            .await
            {
                Ok(result) => {
                    recognized += 1;
                    attempt.text_len += result.text.chars().count();
                    tier_text.record(page, result.text);
                }
                Err(failure) => {
                    tracing::warn!("{} failed on page {}: {}", tier.method, page, failure);
                    if matches!(failure, PageFailure::Preprocessing(_)) {
                        notes.push(format!("page {} skipped: {}", page, failure));
                    }
                    last_error = Some(format!("page {}: {}", page, failure));
                }
            }
        }

        attempt.detail = last_error;
        if recognized > 0 {
            attempt.outcome = AttemptOutcome::Insufficient;
        }
        attempt
    }
}

/// Text one tier returned, by page. Pages it failed on are absent and
/// score zero.
#[derive(Default)]
struct TierText {
    pages: BTreeMap<u32, String>,
}

impl TierText {
    fn record(&mut self, page: u32, text: String) {
        self.pages.insert(page, text);
    }

    fn page_text(&self, page: u32) -> &str {
        self.pages.get(&page).map_or("", String::as_str)
    }

    /// Yield of this tier's text over the pages it was asked for.
    fn yield_over(&self, pages: &[u32], chars_per_page_target: usize) -> f64 {
        let joined: Vec<&str> = pages.iter().map(|&p| self.page_text(p)).collect();
        yield_quality(
            &joined.join("\n"),
            pages.len() as u32,
            chars_per_page_target,
        )
    }

    fn pages_below(&self, pages: &[u32], min_yield: f64, chars_per_page_target: usize) -> Vec<u32> {
        pages
            .iter()
            .copied()
            .filter(|&p| yield_quality(self.page_text(p), 1, chars_per_page_target) < min_yield)
            .collect()
    }

    fn into_pages(self) -> impl Iterator<Item = (u32, String)> {
        self.pages.into_iter()
    }
}

/// Best-so-far text per page across tiers.
struct CascadeState {
    chars_per_page_target: usize,
    best: BTreeMap<u32, AcquiredPage>,
}

impl CascadeState {
    fn new(chars_per_page_target: usize) -> Self {
        Self {
            chars_per_page_target,
            best: BTreeMap::new(),
        }
    }

    /// Keep `text` for `page` if it beats what the page already has.
    fn offer(&mut self, page: u32, text: String, method: ExtractionMethod) {
        let quality = yield_quality(&text, 1, self.chars_per_page_target);
        let better = self
            .best
            .get(&page)
            .map_or(true, |current| quality > current.yield_quality);
        if better {
            self.best.insert(
                page,
                AcquiredPage {
                    page,
                    text,
                    method,
                    yield_quality: quality,
                },
            );
        }
    }

    fn into_pages(self) -> Vec<AcquiredPage> {
        self.best.into_values().collect()
    }
}

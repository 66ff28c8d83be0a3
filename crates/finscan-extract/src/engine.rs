//! Per-document state machine.
//!
//! `Queued -> Classified -> TextAcquiring -> FieldsExtracted -> Validated ->
//! Finalized`. Every path, including unreadable input, cancellation and
//! reader failures, ends in a finalized record with a full audit trail.

use std::sync::Arc;

use finscan::budget::BudgetProvider;
use finscan::config::EngineConfig;
use finscan::models::{
    ClassificationResult, DocumentHandle, ExtractionMethod, ExtractionRecord, FieldValue,
    FinalStatus, Stage, TemplateSource, TemplateType, TransactionRecord,
};

use crate::acquisition::{AcquiredPage, AcquiredText, CancellationFlag, TextAcquisition};
use crate::audit::{AuditTrailBuilder, StageTimer};
use crate::classifier::Classifier;
use crate::document::{open_document, DocumentReader};
use crate::error::EngineError;
use crate::extractors::{ExtractorRegistry, FieldExtractor, FieldSet};
use crate::ocr::{self, OcrBackend};
use crate::scoring::ConfidenceScorer;
use crate::templates::TemplateRegistry;
use crate::validation::SchemaValidator;

/// One document to process.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub document_id: String,
    pub content: Vec<u8>,
    pub template_hint: Option<TemplateType>,
    pub cloud_authorized: bool,
}

impl ExtractionRequest {
    pub fn new(document_id: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            document_id: document_id.into(),
            content,
            template_hint: None,
            cloud_authorized: false,
        }
    }

    pub fn with_template_hint(mut self, hint: Option<TemplateType>) -> Self {
        self.template_hint = hint;
        self
    }

    pub fn with_cloud_authorized(mut self, authorized: bool) -> Self {
        self.cloud_authorized = authorized;
        self
    }
}

/// Finalized record plus the normalized text it was extracted from.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    pub record: ExtractionRecord,
    /// Absent when no text was acquired (unreadable input).
    pub text: Option<String>,
}

pub struct ExtractionEngine {
    config: Arc<EngineConfig>,
    registry: &'static TemplateRegistry,
    extractors: ExtractorRegistry,
    acquisition: TextAcquisition,
}

impl ExtractionEngine {
    /// Engine without recognition backends; only native text is acquired
    /// until backends are attached.
    pub fn new(config: EngineConfig, budget: Arc<dyn BudgetProvider>) -> Self {
        let acquisition = TextAcquisition::new(config.acquisition.clone(), budget);
        Self {
            config: Arc::new(config),
            registry: TemplateRegistry::global(),
            extractors: ExtractorRegistry::with_defaults(),
            acquisition,
        }
    }

    /// Engine with Tesseract for the local tier and the configured cloud chain.
    pub fn with_default_backends(config: EngineConfig, budget: Arc<dyn BudgetProvider>) -> Self {
        let local = ocr::local_backend(&config);
        let cloud = ocr::cloud_backend(&config);
        Self::new(config, budget)
            .with_local_backend(local)
            .with_cloud_backend(cloud)
    }

    pub fn with_local_backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.acquisition = self.acquisition.with_local_backend(backend);
        self
    }

    pub fn with_cloud_backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.acquisition = self.acquisition.with_cloud_backend(backend);
        self
    }

    /// Register an additional (or replacement) extraction strategy.
    pub fn with_extractor(mut self, extractor: Arc<dyn FieldExtractor>) -> Self {
        self.extractors.register(extractor);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one document through every stage. Always returns a record.
    pub async fn process(
        &self,
        request: ExtractionRequest,
        cancel: &CancellationFlag,
    ) -> ExtractionOutput {
        let ExtractionRequest {
            document_id,
            content,
            template_hint,
            cloud_authorized,
        } = request;
        tracing::debug!("Document {} queued ({} bytes)", document_id, content.len());
        let mut run = DocumentRun::new(
            &document_id,
            template_hint,
            self.config.output.include_timings,
        );
        // Properties of the raw bytes until a reader describes them better.
        run.audit
            .document(&DocumentHandle::unsupported(&document_id, &content, template_hint));

        // Open
        run.timer.start(Stage::Open);
        let reader = match self.open(&document_id, content, template_hint).await {
            Ok(reader) => reader,
            Err(EngineError::UnsupportedFormat(reason)) => return run.finalize_unsupported(reason),
            Err(e) => return run.finalize_failure(e),
        };
        let handle = reader.handle().clone();
        run.audit.document(&handle);

        // Classified
        if cancel.is_cancelled() {
            return run.finalize_cancelled("classify");
        }
        run.timer.start(Stage::Classify);
        let native_text = match read_native_text(reader.clone()).await {
            Ok(text) => text,
            Err(EngineError::UnsupportedFormat(reason)) => return run.finalize_unsupported(reason),
            Err(e) => return run.finalize_failure(e),
        };
        let classification = Classifier::new(self.config.classifier.clone(), self.registry)
            .classify(&handle, &native_text);
        run.audit.classification(&classification);

        // TextAcquiring
        if cancel.is_cancelled() {
            return run.finalize_cancelled("acquire");
        }
        run.timer.start(Stage::Acquire);
        let acquired = self
            .acquisition
            .acquire(reader, native_text, cloud_authorized.into(), cancel)
            .await;
        run.audit
            .attempts(&acquired.attempts)
            .notes(acquired.notes.iter().cloned());
        if acquired.cancelled {
            return run.finalize_cancelled("acquire");
        }
        let text = acquired.text();
        let template_type = self.resolve_template(&classification, &text, &mut run.audit);

        // FieldsExtracted
        if cancel.is_cancelled() {
            return run.finalize_cancelled("extract");
        }
        run.timer.start(Stage::Extract);
        let (Some(template), Some(extractor)) = (
            self.registry.get(template_type),
            self.extractors.get(template_type),
        ) else {
            run.audit.note("no template matched; fields require manual entry");
            if !acquired.sufficient {
                run.audit.note(insufficient_note(acquired.final_yield()));
            }
            return run.finalize(
                template_type,
                FinalStatus::RequiresManualReview,
                FieldSet::default(),
                Some(text.text),
            );
        };
        let mut set = extractor.extract(&text.text, template);
        attach_sources(&mut set.fields, &mut set.rows, &text);
        tracing::debug!(
            "Document {}: {} of {} fields resolved, {} rows",
            document_id,
            set.present_count(),
            set.fields.len(),
            set.rows.len()
        );

        // Validated
        if cancel.is_cancelled() {
            return run.finalize_cancelled("validate");
        }
        run.timer.start(Stage::Score);
        let scores = ConfidenceScorer::new(self.config.scoring.clone()).score(
            &mut set,
            &template.schema,
            handle.page_count,
            primary_method(&acquired.pages),
        );
        run.timer.start(Stage::Validate);
        let validation = SchemaValidator::new(self.config.validation.clone()).validate(
            &template.schema,
            &set.fields,
            &set.rows,
        );
        let validation_error = validation
            .is_blocking()
            .then(|| EngineError::SchemaValidation(validation.errors.join("; ")).to_string());
        run.audit.scores(scores).validation(validation);

        let status = if !acquired.sufficient {
            run.audit.note(insufficient_note(acquired.final_yield()));
            FinalStatus::RequiresManualReview
        } else if let Some(error) = validation_error {
            run.audit.note(error);
            FinalStatus::ValidationFailed
        } else {
            FinalStatus::Complete
        };

        run.finalize(template_type, status, set, Some(text.text))
    }

    async fn open(
        &self,
        document_id: &str,
        content: Vec<u8>,
        template_hint: Option<TemplateType>,
    ) -> Result<Arc<dyn DocumentReader>, EngineError> {
        let dpi = self.config.acquisition.render_dpi;
        let document_id = document_id.to_string();
        tokio::task::spawn_blocking(move || {
            open_document(&document_id, &content, template_hint, dpi)
        })
        .await
        .map_err(|e| EngineError::TransientIo(format!("open task aborted: {}", e)))?
        .map_err(EngineError::from)
    }

    fn resolve_template(
        &self,
        classification: &ClassificationResult,
        text: &AcquiredText,
        audit: &mut AuditTrailBuilder,
    ) -> TemplateType {
        match classification.template_source {
            TemplateSource::Hint | TemplateSource::Markers => classification.template_type,
            TemplateSource::Deferred | TemplateSource::Undetected => {
                match self.registry.detect(&text.text) {
                    Some((template_type, _)) => {
                        audit.note(format!(
                            "template detected after text acquisition: {}",
                            template_type
                        ));
                        template_type
                    }
                    None => TemplateType::Unknown,
                }
            }
        }
    }
}

async fn read_native_text(reader: Arc<dyn DocumentReader>) -> Result<Vec<String>, EngineError> {
    tokio::task::spawn_blocking(move || {
        (1..=reader.handle().page_count)
            .map(|page| reader.native_page_text(page))
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| EngineError::TransientIo(format!("native text task aborted: {}", e)))?
    .map_err(EngineError::from)
}

fn insufficient_note(final_yield: f64) -> String {
    format!(
        "text acquisition insufficient (final yield {:.4}); manual review required",
        final_yield
    )
}

/// Record which tier produced each matched value.
fn attach_sources(fields: &mut [FieldValue], rows: &mut [TransactionRecord], text: &AcquiredText) {
    for field in fields.iter_mut() {
        if let Some(evidence) = &field.evidence {
            field.source = text.method_at(evidence.offset);
        }
    }
    for row in rows.iter_mut() {
        row.source = text.method_at(row.offset);
    }
}

/// The tier that supplied the most pages; ties go to the cheaper tier.
fn primary_method(pages: &[AcquiredPage]) -> Option<ExtractionMethod> {
    let mut counts = [0usize; 3];
    for page in pages {
        counts[page.method.tier() as usize] += 1;
    }
    [
        ExtractionMethod::NativeText,
        ExtractionMethod::LocalOcr,
        ExtractionMethod::CloudOcr,
    ]
    .into_iter()
    .zip(counts)
    .filter(|(_, count)| *count > 0)
    .fold(None, |best: Option<(ExtractionMethod, usize)>, (method, count)| match best {
        Some((_, best_count)) if best_count >= count => best,
        _ => Some((method, count)),
    })
    .map(|(method, _)| method)
}

/// Bookkeeping for one document while it moves through the stages.
struct DocumentRun {
    document_id: String,
    template_hint: Option<TemplateType>,
    timer: StageTimer,
    audit: AuditTrailBuilder,
}

impl DocumentRun {
    fn new(document_id: &str, template_hint: Option<TemplateType>, include_timings: bool) -> Self {
        Self {
            document_id: document_id.to_string(),
            template_hint,
            timer: StageTimer::new(),
            audit: AuditTrailBuilder::new(include_timings),
        }
    }

    fn hinted_template(&self) -> TemplateType {
        self.template_hint.unwrap_or(TemplateType::Unknown)
    }

    fn finalize_cancelled(mut self, next_stage: &'static str) -> ExtractionOutput {
        let note = EngineError::Cancelled(next_stage).to_string();
        tracing::info!("Document {}: {}", self.document_id, note);
        self.audit.note(note);
        let template_type = self.hinted_template();
        self.finalize(
            template_type,
            FinalStatus::RequiresManualReview,
            FieldSet::default(),
            None,
        )
    }

    fn finalize_unsupported(mut self, reason: String) -> ExtractionOutput {
        tracing::warn!("Document {} unsupported: {}", self.document_id, reason);
        self.audit
            .classification(&ClassificationResult::unsupported(self.template_hint))
            .note(EngineError::UnsupportedFormat(reason).to_string());
        let template_type = self.hinted_template();
        self.finalize(
            template_type,
            FinalStatus::ValidationFailed,
            FieldSet::default(),
            None,
        )
    }

    fn finalize_failure(mut self, error: EngineError) -> ExtractionOutput {
        tracing::warn!("Document {} failed: {}", self.document_id, error);
        self.audit.note(error.to_string());
        let template_type = self.hinted_template();
        self.finalize(
            template_type,
            FinalStatus::RequiresManualReview,
            FieldSet::default(),
            None,
        )
    }

    fn finalize(
        mut self,
        template_type: TemplateType,
        status: FinalStatus,
        set: FieldSet,
        text: Option<String>,
    ) -> ExtractionOutput {
        self.timer.start(Stage::Finalize);
        self.timer.stop();
        let record = self.audit.build(
            &self.document_id,
            template_type,
            status,
            &set.fields,
            &set.rows,
            &self.timer,
        );
        tracing::info!(
            "Document {} finalized as {} (confidence {:.3}, completeness {:.1}%)",
            record.document_id,
            record.status,
            record.audit.aggregate_confidence,
            record.audit.completeness_pct
        );
        ExtractionOutput { record, text }
    }
}

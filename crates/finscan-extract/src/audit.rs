//! Audit trail assembly and per-stage timing.
//!
//! The builder only aggregates what earlier stages decided. It runs once per
//! document on every terminal path.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use finscan::models::{
    round4, AttemptSummary, AuditMetadata, ClassificationResult, ClassificationSummary,
    DocumentHandle, DocumentProperties, ExtractionAttempt, ExtractionRecord, FieldValue,
    FinalStatus, Stage, TemplateType, TextAvailability, TransactionRecord, ValidationResult,
};

use crate::scoring::ScoreReport;

/// Wall-clock time spent per stage.
#[derive(Debug, Default)]
pub struct StageTimer {
    elapsed: BTreeMap<Stage, Duration>,
    current: Option<(Stage, Instant)>,
}

impl StageTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the running stage (if any) and start `stage`.
    pub fn start(&mut self, stage: Stage) {
        self.stop();
        self.current = Some((stage, Instant::now()));
    }

    pub fn stop(&mut self) {
        if let Some((stage, started)) = self.current.take() {
            *self.elapsed.entry(stage).or_default() += started.elapsed();
        }
    }

    pub fn current(&self) -> Option<Stage> {
        self.current.map(|(stage, _)| stage)
    }

    /// Elapsed milliseconds for every stage; stages never entered read zero.
    pub fn millis(&self) -> BTreeMap<String, u64> {
        Stage::ALL
            .iter()
            .map(|stage| {
                let ms = self.elapsed.get(stage).map_or(0, |d| d.as_millis() as u64);
                (stage.as_str().to_string(), ms)
            })
            .collect()
    }

    /// Every stage key with a zero value.
    pub fn zeroed() -> BTreeMap<String, u64> {
        Stage::ALL
            .iter()
            .map(|stage| (stage.as_str().to_string(), 0))
            .collect()
    }
}

pub struct AuditTrailBuilder {
    include_timings: bool,
    properties: Option<DocumentProperties>,
    classification: Option<ClassificationSummary>,
    attempts: Vec<AttemptSummary>,
    scores: Option<ScoreReport>,
    validation: ValidationResult,
    notes: Vec<String>,
}

impl AuditTrailBuilder {
    pub fn new(include_timings: bool) -> Self {
        Self {
            include_timings,
            properties: None,
            classification: None,
            attempts: Vec::new(),
            scores: None,
            validation: ValidationResult::default(),
            notes: Vec::new(),
        }
    }

    pub fn document(&mut self, handle: &DocumentHandle) -> &mut Self {
        self.properties = Some(handle.properties());
        self
    }

    pub fn classification(&mut self, result: &ClassificationResult) -> &mut Self {
        self.classification = Some(ClassificationSummary::from_result(result));
        self
    }

    pub fn attempts(&mut self, attempts: &[ExtractionAttempt]) -> &mut Self {
        self.attempts = attempts
            .iter()
            .map(|a| AttemptSummary::from_attempt(a, self.include_timings))
            .collect();
        self
    }

    pub fn scores(&mut self, report: ScoreReport) -> &mut Self {
        self.scores = Some(report);
        self
    }

    pub fn validation(&mut self, result: ValidationResult) -> &mut Self {
        self.validation = result;
        self
    }

    pub fn note(&mut self, note: impl Into<String>) -> &mut Self {
        self.notes.push(note.into());
        self
    }

    pub fn notes(&mut self, notes: impl IntoIterator<Item = String>) -> &mut Self {
        self.notes.extend(notes);
        self
    }

    /// Assemble the output record.
    pub fn build(
        self,
        document_id: &str,
        template_type: TemplateType,
        status: FinalStatus,
        fields: &[FieldValue],
        rows: &[TransactionRecord],
        timer: &StageTimer,
    ) -> ExtractionRecord {
        let scores = self.scores.unwrap_or_else(|| ScoreReport {
            field_confidence: BTreeMap::new(),
            aggregate: 0.0,
            completeness_pct: 0.0,
            suspicious_patterns: Vec::new(),
        });

        let properties = self.properties.unwrap_or_else(|| {
            DocumentHandle::unsupported(document_id, &[], None).properties()
        });
        let classification = self.classification.unwrap_or(ClassificationSummary {
            verdict: TextAvailability::Unsupported,
            template_type,
            confidence: 0.0,
            image_pages: Vec::new(),
        });

        let audit = AuditMetadata {
            document_properties: properties,
            classification,
            extraction_attempts: self.attempts,
            field_confidence: scores
                .field_confidence
                .into_iter()
                .map(|(name, confidence)| (name, round4(confidence)))
                .collect(),
            aggregate_confidence: round4(scores.aggregate),
            completeness_pct: round4(scores.completeness_pct),
            suspicious_patterns: scores.suspicious_patterns,
            validation_warnings: self.validation.warnings,
            validation_errors: self.validation.errors,
            notes: self.notes,
            processing_ms: if self.include_timings {
                timer.millis()
            } else {
                StageTimer::zeroed()
            },
        };

        ExtractionRecord {
            document_id: document_id.to_string(),
            template_type,
            status,
            fields: fields
                .iter()
                .map(|f| (f.name.clone(), f.value.clone()))
                .collect(),
            transactions: rows
                .iter()
                .map(|row| TransactionRecord {
                    confidence: round4(row.confidence),
                    ..row.clone()
                })
                .collect(),
            audit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscan::models::{AttemptOutcome, ExtractionMethod, FieldData};

    fn attempt() -> ExtractionAttempt {
        ExtractionAttempt {
            method: ExtractionMethod::NativeText,
            pages: vec![1],
            text_len: 42,
            yield_quality: 0.123456,
            timestamp: chrono::Utc::now(),
            outcome: AttemptOutcome::Insufficient,
            detail: None,
        }
    }

    #[test]
    fn test_minimal_record_still_has_audit() {
        let record = AuditTrailBuilder::new(false).build(
            "doc-1",
            TemplateType::Unknown,
            FinalStatus::ValidationFailed,
            &[],
            &[],
            &StageTimer::new(),
        );
        assert!(record.fields.is_empty());
        assert_eq!(
            record.audit.classification.verdict,
            TextAvailability::Unsupported
        );
        let json = record.to_json(false).unwrap();
        assert!(json.contains("\"audit\""));
        assert!(json.contains(r#""processing_ms":{"acquire":0,"classify":0,"extract":0,"finalize":0,"open":0,"score":0,"validate":0}"#));
    }

    #[test]
    fn test_disabled_timings_keep_stage_keys() {
        let mut timer = StageTimer::new();
        timer.start(Stage::Open);
        std::thread::sleep(Duration::from_millis(5));
        timer.stop();
        let record = AuditTrailBuilder::new(false).build(
            "doc",
            TemplateType::Unknown,
            FinalStatus::RequiresManualReview,
            &[],
            &[],
            &timer,
        );
        assert_eq!(record.audit.processing_ms.len(), Stage::ALL.len());
        assert!(record.audit.processing_ms.values().all(|ms| *ms == 0));

        let record = AuditTrailBuilder::new(true).build(
            "doc",
            TemplateType::Unknown,
            FinalStatus::RequiresManualReview,
            &[],
            &[],
            &timer,
        );
        assert!(record.audit.processing_ms["open"] >= 5);
        assert_eq!(record.audit.processing_ms["finalize"], 0);
    }

    #[test]
    fn test_timings_only_when_enabled() {
        let mut builder = AuditTrailBuilder::new(false);
        builder.attempts(&[attempt()]);
        let record = builder.build(
            "doc",
            TemplateType::Unknown,
            FinalStatus::RequiresManualReview,
            &[],
            &[],
            &StageTimer::new(),
        );
        assert!(record.audit.extraction_attempts[0].timestamp.is_none());
        assert_eq!(record.audit.extraction_attempts[0].yield_quality, 0.1235);

        let mut timer = StageTimer::new();
        timer.start(Stage::Open);
        timer.start(Stage::Classify);
        timer.stop();
        let mut builder = AuditTrailBuilder::new(true);
        builder.attempts(&[attempt()]);
        let record = builder.build(
            "doc",
            TemplateType::Unknown,
            FinalStatus::RequiresManualReview,
            &[],
            &[],
            &timer,
        );
        assert!(record.audit.extraction_attempts[0].timestamp.is_some());
        let timings = record.audit.processing_ms;
        assert!(timings.contains_key("open"));
        assert!(timings.contains_key("classify"));
    }

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let fields = vec![
            FieldValue::absent("filing_id"),
            FieldValue::matched(
                "filer_name",
                FieldData::Text("Jane".into()),
                finscan::models::MatchEvidence {
                    rule_index: 0,
                    rule_count: 1,
                    conflicting: false,
                    offset: 0,
                    typed: true,
                },
            ),
        ];
        let record = AuditTrailBuilder::new(false).build(
            "doc",
            TemplateType::TransactionReport,
            FinalStatus::Complete,
            &fields,
            &[],
            &StageTimer::new(),
        );
        let json = record.to_json(false).unwrap();
        assert!(json.contains(r#""fields":{"filer_name":"Jane","filing_id":null}"#));
    }
}

//! Confidence and completeness scoring, plus suspicious-pattern detection.

use std::collections::BTreeMap;

use finscan::config::ScoringConfig;
use finscan::models::{ExtractionMethod, FieldValue, TemplateType, TransactionRecord};

use crate::extractors::FieldSet;
use crate::templates::{TemplateSchema, TRANSACTIONS_FIELD};

/// Scores for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    /// Confidence per expected field, absent fields at 0.
    pub field_confidence: BTreeMap<String, f64>,
    /// Weighted mean over the expected fields that resolved.
    pub aggregate: f64,
    /// Resolved expected fields over all expected fields, as a percentage.
    pub completeness_pct: f64,
    pub suspicious_patterns: Vec<String>,
}

/// Lowest confidence a resolved value can carry.
const MIN_PRESENT_CONFIDENCE: f64 = 0.01;

pub struct ConfidenceScorer {
    config: ScoringConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Earlier rules in a field's list are the more specific ones.
    pub fn specificity(&self, rule_index: usize) -> f64 {
        (1.0 - self.config.rule_decay * rule_index as f64).max(0.5)
    }

    fn tier_weight(&self, source: Option<ExtractionMethod>) -> f64 {
        source.map_or(self.config.local_ocr_weight, |m| self.config.tier_weight(m))
    }

    /// Confidence of a single field; 0 for an absent field.
    pub fn field_confidence(&self, field: &FieldValue) -> f64 {
        let (Some(_), Some(evidence)) = (&field.value, &field.evidence) else {
            return 0.0;
        };
        let mut confidence = self.specificity(evidence.rule_index) * self.tier_weight(field.source);
        if evidence.conflicting {
            confidence *= 1.0 - self.config.conflict_penalty;
        }
        if !evidence.typed {
            confidence *= 0.5;
        }
        confidence.clamp(MIN_PRESENT_CONFIDENCE, 1.0)
    }

    pub fn row_confidence(&self, row: &TransactionRecord) -> f64 {
        let confidence =
            self.specificity(row.rule_index) * self.tier_weight(row.source) * row.cell_coverage;
        confidence.clamp(MIN_PRESENT_CONFIDENCE, 1.0)
    }

    /// Score a field set in place and summarize it.
    ///
    /// `primary_method` is the tier that produced most of the text; it
    /// weighs a row region that was found but held no rows.
    pub fn score(
        &self,
        set: &mut FieldSet,
        schema: &TemplateSchema,
        page_count: u32,
        primary_method: Option<ExtractionMethod>,
    ) -> ScoreReport {
        let mut field_confidence = BTreeMap::new();
        let mut weighted = 0.0;
        let mut weights = 0.0;
        let mut present = 0usize;
        let mut conflicting = Vec::new();

        for field in &mut set.fields {
            field.confidence = self.field_confidence(field);
        }
        for row in &mut set.rows {
            row.confidence = self.row_confidence(row);
        }

        for schema_field in &schema.fields {
            let field = set.fields.iter().find(|f| f.name == schema_field.name);
            let confidence = field.map_or(0.0, |f| f.confidence);
            field_confidence.insert(schema_field.name.to_string(), confidence);

            let Some(field) = field.filter(|f| f.is_present()) else {
                continue;
            };
            present += 1;
            let weight = if schema_field.required {
                self.config.required_weight
            } else {
                1.0
            };
            weighted += weight * confidence;
            weights += weight;
            if field.evidence.as_ref().is_some_and(|e| e.conflicting) {
                conflicting.push(field.name.clone());
            }
        }

        // A region holding lines no row rule could read is not a table we
        // extracted, even if some rows came out of it.
        let rows_present = set.row_region_found && set.unparsed_rows == 0;
        if schema.has_rows {
            let confidence = if !rows_present {
                0.0
            } else if set.rows.is_empty() {
                self.tier_weight(primary_method) * 0.5
            } else {
                set.rows.iter().map(|r| r.confidence).sum::<f64>() / set.rows.len() as f64
            };
            field_confidence.insert(TRANSACTIONS_FIELD.to_string(), confidence);
            if rows_present {
                present += 1;
                weighted += confidence;
                weights += 1.0;
            }
        }

        let expected = schema.expected_fields().len();
        let completeness_pct = if expected == 0 {
            0.0
        } else {
            present as f64 / expected as f64 * 100.0
        };
        let aggregate = if weights > 0.0 {
            weighted / weights
        } else {
            0.0
        };

        let mut suspicious_patterns = Vec::new();
        if schema.template_type == TemplateType::TransactionReport
            && page_count > 1
            && set.rows.is_empty()
        {
            suspicious_patterns.push(format!(
                "transaction_report_without_rows: 0 transaction rows from {} pages",
                page_count
            ));
        }
        if set.unparsed_rows > 0 {
            suspicious_patterns.push(format!(
                "unparsed_rows: {} region line(s) matched no row rule",
                set.unparsed_rows
            ));
        }
        if aggregate >= self.config.high_confidence
            && completeness_pct < self.config.completeness_floor_pct
        {
            suspicious_patterns.push(format!(
                "high_confidence_low_completeness: confidence {:.2} with completeness {:.1}%",
                aggregate, completeness_pct
            ));
        }
        if !conflicting.is_empty() {
            suspicious_patterns.push(format!(
                "conflicting_matches: {}",
                conflicting.join(", ")
            ));
        }

        ScoreReport {
            field_confidence,
            aggregate,
            completeness_pct,
            suspicious_patterns,
        }
    }
}

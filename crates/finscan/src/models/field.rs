//! Extracted field values and repeated transaction rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ExtractionMethod;

/// Declared type of a field in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Date,
    CurrencyRange,
    Enum,
    FreeText,
    Checkbox,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Date => "date",
            ValueType::CurrencyRange => "currency_range",
            ValueType::Enum => "enum",
            ValueType::FreeText => "free_text",
            ValueType::Checkbox => "checkbox",
        }
    }
}

/// Disclosure amount bracket, in whole dollars. `high` is `None` for open-ended
/// brackets such as "Over $50,000,000".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountRange {
    pub low: u64,
    pub high: Option<u64>,
}

impl AmountRange {
    pub fn is_ordered(&self) -> bool {
        self.high.map_or(true, |high| self.low <= high)
    }
}

/// A resolved field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldData {
    Text(String),
    Date(NaiveDate),
    AmountRange(AmountRange),
    Checkbox(bool),
    Enum(String),
}

impl FieldData {
    /// The value type this data conforms to.
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldData::Text(_) => ValueType::FreeText,
            FieldData::Date(_) => ValueType::Date,
            FieldData::AmountRange(_) => ValueType::CurrencyRange,
            FieldData::Checkbox(_) => ValueType::Checkbox,
            FieldData::Enum(_) => ValueType::Enum,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldData::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// Where and how a field value was matched.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvidence {
    /// Index of the winning rule in the field's ordered rule list.
    pub rule_index: usize,
    pub rule_count: usize,
    /// A later rule also matched and produced a different value.
    pub conflicting: bool,
    /// Byte offset of the match in the normalized document text.
    pub offset: usize,
    /// Whether the matched text converted cleanly to the declared type.
    pub typed: bool,
}

/// One field of the extracted record.
///
/// `value: None` is an explicit absence (the field was attempted and no rule
/// matched); it always carries confidence 0 and no evidence. A field that was
/// never attempted has no `FieldValue` at all.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Option<FieldData>,
    pub confidence: f64,
    /// Tier whose text produced the match.
    pub source: Option<ExtractionMethod>,
    pub evidence: Option<MatchEvidence>,
}

impl FieldValue {
    pub fn absent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            confidence: 0.0,
            source: None,
            evidence: None,
        }
    }

    /// A matched value awaiting scoring.
    pub fn matched(name: &str, value: FieldData, evidence: MatchEvidence) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value),
            confidence: 0.0,
            source: None,
            evidence: Some(evidence),
        }
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

/// One row of a repeated structure (transaction list, asset schedule, gift list).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    /// 0-based position in document order.
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<AmountRange>,
    pub confidence: f64,
    #[serde(skip)]
    pub source: Option<ExtractionMethod>,
    /// Index of the row rule that matched.
    #[serde(skip)]
    pub rule_index: usize,
    /// Fraction of the template's expected row cells that were filled.
    #[serde(skip)]
    pub cell_coverage: f64,
    /// Byte offset of the row in the extraction text.
    #[serde(skip)]
    pub offset: usize,
}

//! Typed value parsing for matched text.

use chrono::NaiveDate;
use finscan::models::{AmountRange, FieldData, ValueType};

use crate::templates::PatternRule;

/// ISO `YYYY-MM-DD` (the normalizer rewrites other forms).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn dollars(raw: &str) -> Option<u64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| !matches!(c, ',' | ' '))
        .collect();
    let whole = cleaned.split('.').next()?;
    if whole.is_empty() {
        return None;
    }
    whole.parse().ok()
}

/// Parse "$1,001 - $15,000", "Over $50,000,000" or an exact "$415.00".
pub fn parse_amount(raw: &str) -> Option<AmountRange> {
    let raw = raw.trim();
    if let Some(rest) = raw
        .strip_prefix("Over")
        .or_else(|| raw.strip_prefix("over"))
    {
        return Some(AmountRange {
            low: dollars(rest)?,
            high: None,
        });
    }
    if let Some((low, high)) = raw.split_once('-') {
        return Some(AmountRange {
            low: dollars(low)?,
            high: Some(dollars(high)?),
        });
    }
    if !raw.starts_with('$') {
        return None;
    }
    let value = dollars(raw)?;
    Some(AmountRange {
        low: value,
        high: Some(value),
    })
}

/// Canonical spelling of an enumeration member, matched case-insensitively.
pub fn canonical_option(raw: &str, options: &[&'static str]) -> Option<&'static str> {
    let wanted = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    options
        .iter()
        .copied()
        .find(|option| option.eq_ignore_ascii_case(&wanted))
}

/// Convert matched text to the rule's declared type.
///
/// Returns the value and whether the conversion succeeded. Text that does not
/// convert is kept verbatim so schema validation can report it.
pub fn typed_value(rule: &PatternRule, raw: &str) -> (FieldData, bool) {
    match rule.value_type {
        ValueType::Date => match parse_date(raw) {
            Some(date) => (FieldData::Date(date), true),
            None => (FieldData::Text(raw.to_string()), false),
        },
        ValueType::CurrencyRange => match parse_amount(raw) {
            Some(range) => (FieldData::AmountRange(range), true),
            None => (FieldData::Text(raw.to_string()), false),
        },
        ValueType::Enum => match canonical_option(raw, &rule.options) {
            Some(option) => (FieldData::Enum(option.to_string()), true),
            None => (FieldData::Enum(raw.to_string()), rule.options.is_empty()),
        },
        ValueType::FreeText => (FieldData::Text(raw.to_string()), true),
        ValueType::Checkbox => match raw.to_ascii_lowercase().as_str() {
            "yes" | "true" | "x" => (FieldData::Checkbox(true), true),
            "no" | "false" => (FieldData::Checkbox(false), true),
            _ => (FieldData::Text(raw.to_string()), false),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_forms() {
        assert_eq!(
            parse_amount("$1,001 - $15,000"),
            Some(AmountRange {
                low: 1001,
                high: Some(15000)
            })
        );
        assert_eq!(
            parse_amount("Over $50,000,000"),
            Some(AmountRange {
                low: 50_000_000,
                high: None
            })
        );
        assert_eq!(
            parse_amount("$415.00"),
            Some(AmountRange {
                low: 415,
                high: Some(415)
            })
        );
        assert_eq!(parse_amount("None"), None);
        assert_eq!(parse_amount("$ - $"), None);
    }

    #[test]
    fn test_canonical_option() {
        let options = &["Member", "Officer or Employee"];
        assert_eq!(canonical_option("officer  or employee", options), Some("Officer or Employee"));
        assert_eq!(canonical_option("Senator", options), None);
    }

    #[test]
    fn test_typed_value_keeps_unparseable_text() {
        let rule = PatternRule::capture("signature_date", ValueType::Date, &[r"(\S+)"]);
        let (value, typed) = typed_value(&rule, "2025-13-45");
        assert_eq!(value, FieldData::Text("2025-13-45".to_string()));
        assert!(!typed);

        let (value, typed) = typed_value(&rule, "2025-01-20");
        assert_eq!(value.as_date(), NaiveDate::from_ymd_opt(2025, 1, 20));
        assert!(typed);
    }

    #[test]
    fn test_enum_outside_options_flagged() {
        let rule = PatternRule::capture("filer_status", ValueType::Enum, &[r"(\S+)"])
            .options(&["Member", "Candidate"]);
        let (value, typed) = typed_value(&rule, "Senator");
        assert_eq!(value, FieldData::Enum("Senator".to_string()));
        assert!(!typed);
    }
}

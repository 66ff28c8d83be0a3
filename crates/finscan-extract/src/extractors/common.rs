//! Rule application shared by every extractor strategy.

use std::ops::Range;

use finscan::models::{FieldData, FieldValue, MatchEvidence, TransactionRecord};
use regex::Captures;

use super::checkbox::mark_state;
use super::values::{parse_amount, parse_date, typed_value};
use crate::templates::{MatchKind, PatternRule, RowCell, RowSpec};

/// Resolve a capture rule: the first pattern (in rule order) that matches
/// wins. A later pattern producing a different value marks the match as
/// conflicting.
pub fn capture_field(text: &str, rule: &PatternRule) -> FieldValue {
    let mut winner: Option<FieldValue> = None;

    for (index, pattern) in rule.patterns.iter().enumerate() {
        let Some(group) = pattern.captures(text).and_then(|c| c.get(1)) else {
            continue;
        };
        let raw = group.as_str().trim();
        if raw.is_empty() {
            continue;
        }
        let (value, typed) = typed_value(rule, raw);

        match winner.as_mut() {
            None => {
                winner = Some(FieldValue::matched(
                    rule.field,
                    value,
                    MatchEvidence {
                        rule_index: index,
                        rule_count: rule.patterns.len(),
                        conflicting: false,
                        offset: group.start(),
                        typed,
                    },
                ));
            }
            Some(first) => {
                if first.value.as_ref() != Some(&value) {
                    if let Some(evidence) = first.evidence.as_mut() {
                        evidence.conflicting = true;
                    }
                }
            }
        }
    }

    winner.unwrap_or_else(|| FieldValue::absent(rule.field))
}

/// Resolve a single checkbox from the first label that carries a mark.
pub fn checkbox_field(text: &str, rule: &PatternRule) -> FieldValue {
    let mut winner: Option<FieldValue> = None;

    for (index, label) in rule.patterns.iter().enumerate() {
        let Some((checked, offset)) = mark_state(text, label) else {
            continue;
        };
        let value = FieldData::Checkbox(checked);
        match winner.as_mut() {
            None => {
                winner = Some(FieldValue::matched(
                    rule.field,
                    value,
                    MatchEvidence {
                        rule_index: index,
                        rule_count: rule.patterns.len(),
                        conflicting: false,
                        offset,
                        typed: true,
                    },
                ));
            }
            Some(first) => {
                if first.value.as_ref() != Some(&value) {
                    if let Some(evidence) = first.evidence.as_mut() {
                        evidence.conflicting = true;
                    }
                }
            }
        }
    }

    winner.unwrap_or_else(|| FieldValue::absent(rule.field))
}

/// Resolve a one-of-many checkbox group to the option whose label is checked.
///
/// More than one checked option keeps the first and flags the conflict.
/// Nothing checked leaves the field absent.
pub fn checkbox_group_field(text: &str, rule: &PatternRule) -> FieldValue {
    let checked: Vec<(usize, usize)> = rule
        .patterns
        .iter()
        .enumerate()
        .filter_map(|(index, label)| match mark_state(text, label) {
            Some((true, offset)) => Some((index, offset)),
            _ => None,
        })
        .collect();

    let Some(&(index, offset)) = checked.first() else {
        return FieldValue::absent(rule.field);
    };
    let Some(option) = rule.options.get(index) else {
        return FieldValue::absent(rule.field);
    };

    FieldValue::matched(
        rule.field,
        FieldData::Enum(option.to_string()),
        MatchEvidence {
            rule_index: 0,
            rule_count: 1,
            conflicting: checked.len() > 1,
            offset,
            typed: true,
        },
    )
}

/// Apply every capture rule of a template. Checkbox rules are left absent;
/// only form extractors resolve marks.
pub fn capture_fields(text: &str, rules: &[PatternRule]) -> Vec<FieldValue> {
    rules
        .iter()
        .map(|rule| match rule.kind {
            MatchKind::Capture => capture_field(text, rule),
            MatchKind::Checkbox | MatchKind::CheckboxGroup => {
                tracing::debug!(field = rule.field, "checkbox rule skipped by capture extractor");
                FieldValue::absent(rule.field)
            }
        })
        .collect()
}

/// Byte range of the repeated-row region, if its start marker is present.
///
/// The region begins on the line after the start marker and runs until the
/// first later line matching an end marker, or the end of the text.
pub fn locate_region(text: &str, spec: &RowSpec) -> Option<Range<usize>> {
    let mut start = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let content = line.trim_end_matches('\n');

        match start {
            None => {
                if spec.region_start.iter().any(|m| m.is_match(content)) {
                    start = Some(offset);
                }
            }
            Some(region_start) => {
                if spec.region_end.iter().any(|m| m.is_match(content)) {
                    return Some(region_start..line_start);
                }
            }
        }
    }

    start.map(|region_start| region_start..text.len())
}

fn cell_text<'t>(caps: &Captures<'t>, cell: RowCell) -> Option<&'t str> {
    caps.name(cell.group())
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// What the row region yielded.
#[derive(Debug, Clone, Default)]
pub struct RowRegion {
    pub rows: Vec<TransactionRecord>,
    /// The start marker was found.
    pub found: bool,
    /// Non-blank region lines that matched no row rule and no layout line.
    pub unparsed: usize,
}

fn is_layout_line(content: &str, spec: &RowSpec) -> bool {
    spec.skip
        .iter()
        .chain(&spec.region_start)
        .any(|pattern| pattern.is_match(content))
}

/// Extract rows from the row region in document order.
///
/// Each line is tried against the row rules in order; the first match
/// produces a row. Lines that fit no rule are counted unless they are
/// layout.
pub fn extract_rows(text: &str, spec: &RowSpec) -> RowRegion {
    let Some(region) = locate_region(text, spec) else {
        return RowRegion::default();
    };

    let mut rows = Vec::new();
    let mut unparsed = 0;
    let mut offset = region.start;
    for line in text[region].split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let content = line.trim_end_matches('\n');
        if content.trim().is_empty() {
            continue;
        }

        let parsed = spec.rules.iter().enumerate().find_map(|(rule_index, rule)| {
            let caps = rule.pattern.captures(content)?;
            let asset = cell_text(&caps, RowCell::Asset)?;
            let action = cell_text(&caps, RowCell::Action)
                .map(str::to_string)
                .or_else(|| rule.action.map(str::to_string));
            Some(TransactionRecord {
                row: rows.len(),
                owner: cell_text(&caps, RowCell::Owner).map(str::to_string),
                asset: asset.to_string(),
                action,
                transaction_date: cell_text(&caps, RowCell::TransactionDate).and_then(parse_date),
                notification_date: cell_text(&caps, RowCell::NotificationDate)
                    .and_then(parse_date),
                amount: cell_text(&caps, RowCell::Amount).and_then(parse_amount),
                confidence: 0.0,
                source: None,
                rule_index,
                cell_coverage: 0.0,
                offset: line_start,
            })
        });

        match parsed {
            Some(row) => rows.push(TransactionRecord {
                cell_coverage: cell_coverage(&row, &spec.cells),
                ..row
            }),
            None if is_layout_line(content, spec) => {}
            None => {
                tracing::debug!("Unparsed row line at offset {}", line_start);
                unparsed += 1;
            }
        }
    }

    RowRegion {
        rows,
        found: true,
        unparsed,
    }
}

/// Fraction of `cells` the row filled with typed values.
pub fn cell_coverage(row: &TransactionRecord, cells: &[RowCell]) -> f64 {
    if cells.is_empty() {
        return 1.0;
    }
    let filled = cells
        .iter()
        .filter(|cell| match cell {
            RowCell::Owner => row.owner.is_some(),
            RowCell::Asset => !row.asset.is_empty(),
            RowCell::Action => row.action.is_some(),
            RowCell::TransactionDate => row.transaction_date.is_some(),
            RowCell::NotificationDate => row.notification_date.is_some(),
            RowCell::Amount => row.amount.is_some(),
        })
        .count();
    filled as f64 / cells.len() as f64
}

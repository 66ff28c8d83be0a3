//! Schema validation and business rules.
//!
//! Schema failures on required fields are blocking errors. Failures on
//! optional fields, row-level findings and business-rule violations are
//! warnings.

use chrono::NaiveDate;
use finscan::config::ValidationConfig;
use finscan::models::{
    FieldData, FieldValue, TransactionRecord, ValidationCheck, ValidationResult, ValueType,
};

use crate::templates::{BusinessRule, DateRef, FieldSchema, RowCell, TemplateSchema};

pub struct SchemaValidator {
    config: ValidationConfig,
}

fn display_value(value: &FieldData) -> String {
    match value {
        FieldData::Text(s) | FieldData::Enum(s) => format!("'{}'", s),
        FieldData::Date(d) => d.to_string(),
        FieldData::AmountRange(r) => match r.high {
            Some(high) => format!("{}-{}", r.low, high),
            None => format!("over {}", r.low),
        },
        FieldData::Checkbox(b) => b.to_string(),
    }
}

fn row_date(row: &TransactionRecord, cell: RowCell) -> Option<NaiveDate> {
    match cell {
        RowCell::TransactionDate => row.transaction_date,
        RowCell::NotificationDate => row.notification_date,
        _ => None,
    }
}

impl SchemaValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(
        &self,
        schema: &TemplateSchema,
        fields: &[FieldValue],
        rows: &[TransactionRecord],
    ) -> ValidationResult {
        let mut result = ValidationResult::default();

        for field_schema in &schema.fields {
            let field = fields.iter().find(|f| f.name == field_schema.name);
            self.check_field(field_schema, field, &mut result);
        }
        self.check_rows(rows, &mut result);
        for rule in &schema.business_rules {
            self.check_rule(rule, fields, rows, &mut result);
        }

        result
    }

    fn record(
        result: &mut ValidationResult,
        constraint: &str,
        schema: &FieldSchema,
        passed: bool,
        message: impl FnOnce() -> String,
    ) {
        result.checks.push(ValidationCheck {
            constraint: constraint.to_string(),
            field: Some(schema.name.to_string()),
            passed,
            blocking: schema.required,
        });
        if passed {
            return;
        }
        if schema.required {
            result.errors.push(message());
        } else {
            result.warnings.push(message());
        }
    }

    fn check_field(
        &self,
        schema: &FieldSchema,
        field: Option<&FieldValue>,
        result: &mut ValidationResult,
    ) {
        let value = field.and_then(|f| f.value.as_ref());
        if schema.required {
            Self::record(result, "required", schema, value.is_some(), || {
                format!("missing_required_field: {}", schema.name)
            });
        }
        let Some(value) = value else {
            return;
        };

        let typed = field
            .and_then(|f| f.evidence.as_ref())
            .map_or(true, |e| e.typed);
        let conforms = typed && value.value_type() == schema.value_type;
        Self::record(result, "type", schema, conforms, || {
            format!(
                "type_mismatch: {} expected {}, found {}",
                schema.name,
                schema.value_type.as_str(),
                display_value(value)
            )
        });
        if !conforms {
            return;
        }

        match value {
            FieldData::Enum(member) if !schema.options.is_empty() => {
                let known = schema.options.iter().any(|o| o == member);
                Self::record(result, "enum", schema, known, || {
                    format!(
                        "enum_violation: {} value '{}' not in [{}]",
                        schema.name,
                        member,
                        schema.options.join(", ")
                    )
                });
            }
            FieldData::Date(date) if schema.value_type == ValueType::Date => {
                let in_range = self.in_range(*date);
                Self::record(result, "date_range", schema, in_range, || {
                    format!(
                        "date_out_of_range: {} {} outside {}..{}",
                        schema.name, date, self.config.earliest_date, self.config.latest_date
                    )
                });
            }
            _ => {}
        }
    }

    fn in_range(&self, date: NaiveDate) -> bool {
        date >= self.config.earliest_date && date <= self.config.latest_date
    }

    fn check_rows(&self, rows: &[TransactionRecord], result: &mut ValidationResult) {
        for row in rows {
            if let Some(amount) = row.amount.filter(|a| !a.is_ordered()) {
                result.warnings.push(format!(
                    "amount_range_inverted: low {} above high {} (row {})",
                    amount.low,
                    amount.high.unwrap_or_default(),
                    row.row + 1
                ));
            }
            for (name, date) in [
                ("transaction_date", row.transaction_date),
                ("notification_date", row.notification_date),
            ] {
                if let Some(date) = date.filter(|d| !self.in_range(*d)) {
                    result.warnings.push(format!(
                        "date_out_of_range: {} {} (row {})",
                        name,
                        date,
                        row.row + 1
                    ));
                }
            }
        }
    }

    fn check_rule(
        &self,
        rule: &BusinessRule,
        fields: &[FieldValue],
        rows: &[TransactionRecord],
        result: &mut ValidationResult,
    ) {
        let BusinessRule::DateOrder { earlier, later } = rule;
        let field_date = |name: &str| {
            fields
                .iter()
                .find(|f| f.name == name)
                .and_then(|f| f.value.as_ref())
                .and_then(FieldData::as_date)
        };

        // (earlier, later, row number when row-scoped)
        let mut pairs: Vec<(Option<NaiveDate>, Option<NaiveDate>, Option<usize>)> = Vec::new();
        match (earlier, later) {
            (DateRef::Field(a), DateRef::Field(b)) => {
                pairs.push((field_date(a), field_date(b), None));
            }
            (DateRef::Row(a), DateRef::Row(b)) => {
                for row in rows {
                    pairs.push((row_date(row, *a), row_date(row, *b), Some(row.row + 1)));
                }
            }
            (DateRef::Row(a), DateRef::Field(b)) => {
                let later_date = field_date(b);
                for row in rows {
                    pairs.push((row_date(row, *a), later_date, Some(row.row + 1)));
                }
            }
            (DateRef::Field(a), DateRef::Row(b)) => {
                let earlier_date = field_date(a);
                for row in rows {
                    pairs.push((earlier_date, row_date(row, *b), Some(row.row + 1)));
                }
            }
        }

        let mut passed = true;
        for (first, second, row) in pairs {
            let (Some(first), Some(second)) = (first, second) else {
                continue;
            };
            if first <= second {
                continue;
            }
            passed = false;
            let location = row.map(|r| format!(" (row {})", r)).unwrap_or_default();
            result.warnings.push(format!(
                "date_order_violation: {} {} is after {} {}{}",
                earlier.name(),
                first,
                later.name(),
                second,
                location
            ));
        }

        result.checks.push(ValidationCheck {
            constraint: format!("date_order: {} <= {}", earlier.name(), later.name()),
            field: None,
            passed,
            blocking: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateRegistry;
    use finscan::models::{AmountRange, MatchEvidence, TemplateType};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn field(name: &str, value: FieldData, typed: bool) -> FieldValue {
        FieldValue::matched(
            name,
            value,
            MatchEvidence {
                rule_index: 0,
                rule_count: 1,
                conflicting: false,
                offset: 0,
                typed,
            },
        )
    }

    fn row(tx: &str, notification: &str) -> TransactionRecord {
        TransactionRecord {
            row: 0,
            owner: None,
            asset: "Asset".into(),
            action: Some("purchase".into()),
            transaction_date: Some(date(tx)),
            notification_date: Some(date(notification)),
            amount: Some(AmountRange {
                low: 1001,
                high: Some(15000),
            }),
            confidence: 1.0,
            source: None,
            rule_index: 0,
            cell_coverage: 1.0,
            offset: 0,
        }
    }

    fn ptr_fields() -> Vec<FieldValue> {
        vec![
            field("filer_name", FieldData::Text("Hon. Jane Doe".into()), true),
            field("filer_status", FieldData::Enum("Member".into()), true),
            field("signature_date", FieldData::Date(date("2025-02-20")), true),
        ]
    }

    fn validator() -> SchemaValidator {
        SchemaValidator::new(ValidationConfig::default())
    }

    fn schema(template_type: TemplateType) -> &'static TemplateSchema {
        &TemplateRegistry::global().get(template_type).unwrap().schema
    }

    #[test]
    fn test_valid_report_passes() {
        let result = validator().validate(
            schema(TemplateType::TransactionReport),
            &ptr_fields(),
            &[row("2025-01-10", "2025-01-15")],
        );
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert!(!result.is_blocking());
    }

    #[test]
    fn test_date_order_violation_is_warning() {
        let result = validator().validate(
            schema(TemplateType::TransactionReport),
            &ptr_fields(),
            &[row("2025-02-01", "2025-01-15")],
        );
        assert!(!result.is_blocking());
        assert_eq!(
            result.warnings,
            vec![
                "date_order_violation: transaction_date 2025-02-01 is after notification_date 2025-01-15 (row 1)"
                    .to_string()
            ]
        );
        assert!(result.checks.iter().any(|c| !c.passed && !c.blocking));
    }

    #[test]
    fn test_missing_required_field_blocks() {
        let fields = vec![FieldValue::absent("filer_name")];
        let result = validator().validate(schema(TemplateType::TransactionReport), &fields, &[]);
        assert!(result.is_blocking());
        assert!(result
            .errors
            .contains(&"missing_required_field: filer_name".to_string()));
    }

    #[test]
    fn test_untyped_required_value_blocks() {
        let mut fields = ptr_fields();
        fields[2] = field("signature_date", FieldData::Text("2025-13-45".into()), false);
        let result = validator().validate(schema(TemplateType::TransactionReport), &fields, &[]);
        assert!(result
            .errors
            .iter()
            .any(|e| e.starts_with("type_mismatch: signature_date")));
    }

    #[test]
    fn test_enum_membership() {
        let mut fields = ptr_fields();
        fields[1] = field("filer_status", FieldData::Enum("Senator".into()), true);
        let result = validator().validate(schema(TemplateType::TransactionReport), &fields, &[]);
        assert!(result.errors.iter().any(|e| e.starts_with("enum_violation")));
    }

    #[test]
    fn test_optional_field_failure_is_warning() {
        let mut fields = ptr_fields();
        fields.push(field("state_district", FieldData::Date(date("2025-01-01")), true));
        let result = validator().validate(schema(TemplateType::TransactionReport), &fields, &[]);
        assert!(!result.is_blocking());
        assert!(result.warnings.iter().any(|w| w.starts_with("type_mismatch")));
    }

    #[test]
    fn test_out_of_range_date_blocks_required() {
        let mut fields = ptr_fields();
        fields[2] = field("signature_date", FieldData::Date(date("1901-01-01")), true);
        let result = validator().validate(schema(TemplateType::TransactionReport), &fields, &[]);
        assert!(result.errors.iter().any(|e| e.starts_with("date_out_of_range")));
    }

    #[test]
    fn test_row_findings_are_warnings() {
        let mut inverted = row("2025-01-10", "2025-01-15");
        inverted.amount = Some(AmountRange {
            low: 15000,
            high: Some(1001),
        });
        let result = validator().validate(
            schema(TemplateType::TransactionReport),
            &ptr_fields(),
            &[inverted],
        );
        assert!(!result.is_blocking());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("amount_range_inverted")));
    }
}

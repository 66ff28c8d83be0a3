use finscan::models::TemplateType;

use super::common::{capture_fields, extract_rows, RowRegion};
use super::{FieldExtractor, FieldSet};
use crate::templates::TemplateSpec;

/// Periodic transaction reports: header fields plus the trade table.
pub struct TransactionReportExtractor;

/// Canonical transaction type for the table's action codes.
fn normalize_action(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "p" | "purchase" => "purchase".to_string(),
        "s" | "sale" => "sale".to_string(),
        "s (partial)" | "partial sale" => "partial_sale".to_string(),
        "e" | "exchange" => "exchange".to_string(),
        other => other.to_string(),
    }
}

impl FieldExtractor for TransactionReportExtractor {
    fn template_type(&self) -> TemplateType {
        TemplateType::TransactionReport
    }

    fn extract(&self, text: &str, template: &TemplateSpec) -> FieldSet {
        let fields = capture_fields(text, &template.rules);
        let mut region = template
            .rows
            .as_ref()
            .map(|spec| extract_rows(text, spec))
            .unwrap_or_default();
        for row in &mut region.rows {
            row.action = row.action.as_deref().map(normalize_action);
        }
        let RowRegion {
            rows,
            found,
            unparsed,
        } = region;
        FieldSet {
            fields,
            rows,
            row_region_found: found,
            unparsed_rows: unparsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateRegistry;
    use chrono::NaiveDate;
    use finscan::models::{AmountRange, FieldData};

    const PTR: &str = "PERIODIC TRANSACTION REPORT
Clerk of the House of Representatives
Filing ID #20026537
Name: Hon. Jane Doe
Status: Member
State/District: CA12
TRANSACTIONS
ID Owner Asset Transaction Type Date Notification Date Amount
SP Microsoft Corporation - Common Stock (MSFT) [ST] P 2025-01-15 2025-01-20 $1,001 - $15,000
Apple Inc. - Common Stock (AAPL) [ST] S (partial) 2025-01-10 2025-01-20 $15,001 - $50,000
JT NVIDIA Corporation (NVDA) [ST] Purchase 2025-01-12 Over $50,000,000
* For the complete list of asset type abbreviations, please visit the Clerk's site.
Digitally Signed: Hon. Jane Doe , 2025-01-21";

    fn template() -> &'static TemplateSpec {
        TemplateRegistry::global()
            .get(TemplateType::TransactionReport)
            .unwrap()
    }

    #[test]
    fn test_extracts_header_fields() {
        let set = TransactionReportExtractor.extract(PTR, template());
        assert_eq!(
            set.field("filer_name").unwrap().value,
            Some(FieldData::Text("Hon. Jane Doe".to_string()))
        );
        assert_eq!(
            set.field("filer_status").unwrap().value,
            Some(FieldData::Enum("Member".to_string()))
        );
        assert_eq!(
            set.field("filing_id").unwrap().value,
            Some(FieldData::Text("20026537".to_string()))
        );
        assert_eq!(
            set.field("signature_date").unwrap().value,
            Some(FieldData::Date(NaiveDate::from_ymd_opt(2025, 1, 21).unwrap()))
        );
        assert_eq!(set.present_count(), set.fields.len());
    }

    #[test]
    fn test_extracts_rows_in_order() {
        let set = TransactionReportExtractor.extract(PTR, template());
        assert!(set.row_region_found);
        assert_eq!(set.rows.len(), 3);

        let first = &set.rows[0];
        assert_eq!(first.owner.as_deref(), Some("SP"));
        assert_eq!(first.asset, "Microsoft Corporation - Common Stock (MSFT) [ST]");
        assert_eq!(first.action.as_deref(), Some("purchase"));
        assert_eq!(
            first.amount,
            Some(AmountRange {
                low: 1001,
                high: Some(15000)
            })
        );
        assert_eq!(first.rule_index, 0);
        assert_eq!(first.cell_coverage, 1.0);

        assert_eq!(set.rows[1].owner, None);
        assert_eq!(set.rows[1].action.as_deref(), Some("partial_sale"));

        let third = &set.rows[2];
        assert_eq!(third.rule_index, 1);
        assert_eq!(third.notification_date, None);
        assert_eq!(third.amount.unwrap().high, None);
        assert!(third.cell_coverage < 1.0);
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let set = TransactionReportExtractor.extract("PERIODIC TRANSACTION REPORT", template());
        assert!(set.fields.iter().all(|f| !f.is_present()));
        assert!(!set.row_region_found);
        assert!(set.rows.is_empty());
    }
}

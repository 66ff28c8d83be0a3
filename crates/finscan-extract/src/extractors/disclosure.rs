use finscan::models::TemplateType;

use super::common::{capture_fields, extract_rows};
use super::{FieldExtractor, FieldSet};
use crate::templates::TemplateSpec;

/// Annual and candidate disclosure statements: header fields plus the
/// Schedule A asset table. The row action carries the income type.
pub struct DisclosureExtractor {
    template_type: TemplateType,
}

impl DisclosureExtractor {
    pub fn new(template_type: TemplateType) -> Self {
        Self { template_type }
    }
}

fn clean_income_type(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_end_matches([',', ';']).trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(cleaned.to_string())
    }
}

impl FieldExtractor for DisclosureExtractor {
    fn template_type(&self) -> TemplateType {
        self.template_type
    }

    fn extract(&self, text: &str, template: &TemplateSpec) -> FieldSet {
        let fields = capture_fields(text, &template.rules);
        let Some(spec) = &template.rows else {
            return FieldSet {
                fields,
                ..FieldSet::default()
            };
        };

        let mut region = extract_rows(text, spec);
        for row in &mut region.rows {
            row.action = row.action.as_deref().and_then(clean_income_type);
        }
        FieldSet {
            fields,
            rows: region.rows,
            row_region_found: region.found,
            unparsed_rows: region.unparsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateRegistry;
    use finscan::models::FieldData;

    const ANNUAL: &str = "FINANCIAL DISCLOSURE REPORT
Name: Hon. John Roe
Status: Member
State/District: TX07
Filing Type: Annual Report
Filing Year: 2024
Filing Date: 2025-05-15
SCHEDULE A: ASSETS AND \"UNEARNED\" INCOME
Asset Owner Value of Asset Income Type(s) Income
Vanguard Total Stock Market ETF (VTI) $100,001 - $250,000 Dividends $2,501 - $5,000
SP Rental Property, Austin TX $250,001 - $500,000 Rent $15,001 - $50,000
Savings Account $1,001 - $15,000 None
Bond Fund $15,001 - $50,000
SCHEDULE B: TRANSACTIONS
None disclosed.
Digitally Signed: Hon. John Roe , 2025-05-14";

    #[test]
    fn test_annual_fields_and_schedule() {
        let template = TemplateRegistry::global()
            .get(TemplateType::AnnualDisclosure)
            .unwrap();
        let set = DisclosureExtractor::new(TemplateType::AnnualDisclosure).extract(ANNUAL, template);

        assert_eq!(
            set.field("filing_type").unwrap().value,
            Some(FieldData::Enum("Annual Report".to_string()))
        );
        assert_eq!(
            set.field("filing_year").unwrap().value,
            Some(FieldData::Text("2024".to_string()))
        );
        assert!(set.field("filing_date").unwrap().is_present());

        assert!(set.row_region_found);
        let assets: Vec<&str> = set.rows.iter().map(|r| r.asset.as_str()).collect();
        assert_eq!(
            assets,
            vec![
                "Vanguard Total Stock Market ETF (VTI)",
                "Rental Property, Austin TX",
                "Savings Account",
                "Bond Fund",
            ]
        );
        assert_eq!(set.rows[0].action.as_deref(), Some("Dividends"));
        assert_eq!(set.rows[1].owner.as_deref(), Some("SP"));
        assert_eq!(set.rows[2].action, None);
        assert_eq!(set.rows[3].rule_index, 1);
    }

    #[test]
    fn test_clean_income_type() {
        assert_eq!(clean_income_type("Dividends,"), Some("Dividends".to_string()));
        assert_eq!(clean_income_type("None"), None);
    }
}

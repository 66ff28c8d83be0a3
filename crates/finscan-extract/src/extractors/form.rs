use finscan::models::TemplateType;

use super::common::{capture_field, checkbox_field, checkbox_group_field};
use super::{FieldExtractor, FieldSet};
use crate::templates::{MatchKind, TemplateSpec};

/// Form-style templates (extension requests, termination reports) made of
/// key/value pairs and checkboxes.
pub struct FormExtractor {
    template_type: TemplateType,
}

impl FormExtractor {
    pub fn new(template_type: TemplateType) -> Self {
        Self { template_type }
    }
}

impl FieldExtractor for FormExtractor {
    fn template_type(&self) -> TemplateType {
        self.template_type
    }

    fn extract(&self, text: &str, template: &TemplateSpec) -> FieldSet {
        let fields = template
            .rules
            .iter()
            .map(|rule| match rule.kind {
                MatchKind::Capture => capture_field(text, rule),
                MatchKind::Checkbox => checkbox_field(text, rule),
                MatchKind::CheckboxGroup => checkbox_group_field(text, rule),
            })
            .collect();
        FieldSet {
            fields,
            ..FieldSet::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateRegistry;
    use chrono::NaiveDate;
    use finscan::models::FieldData;

    #[test]
    fn test_extension_request() {
        let text = "REQUEST FOR EXTENSION OF TIME
Name: Hon. Jane Doe
Status: Member
Report Type: [X] Annual Report [ ] Candidate Report [ ] Termination Report
Original Due Date: 2025-05-15
Extension Requested: [ ] 30 days [X] 60 days [ ] 90 days
Date of Request: 2025-05-01
[X] Approved [ ] Denied";
        let template = TemplateRegistry::global()
            .get(TemplateType::ExtensionRequest)
            .unwrap();
        let set = FormExtractor::new(TemplateType::ExtensionRequest).extract(text, template);

        assert_eq!(
            set.field("report_type").unwrap().value,
            Some(FieldData::Enum("Annual Report".to_string()))
        );
        assert_eq!(
            set.field("extension_days").unwrap().value,
            Some(FieldData::Enum("60".to_string()))
        );
        assert_eq!(
            set.field("original_due_date").unwrap().value,
            Some(FieldData::Date(NaiveDate::from_ymd_opt(2025, 5, 15).unwrap()))
        );
        assert_eq!(
            set.field("approved").unwrap().value,
            Some(FieldData::Checkbox(true))
        );
        assert!(set.rows.is_empty());
        assert!(!set.row_region_found);
    }

    #[test]
    fn test_termination_notice() {
        let text = "TERMINATION REPORT
Name: John Smith
Status: Officer or Employee
Employing Office: Office of Rep. Doe
Date of Termination: 2025-03-31
[X] Final report covering the period through termination
Signature Date: 2025-04-10";
        let template = TemplateRegistry::global()
            .get(TemplateType::TerminationNotice)
            .unwrap();
        let set = FormExtractor::new(TemplateType::TerminationNotice).extract(text, template);

        assert_eq!(
            set.field("filer_status").unwrap().value,
            Some(FieldData::Enum("Officer or Employee".to_string()))
        );
        assert_eq!(
            set.field("employing_office").unwrap().value,
            Some(FieldData::Text("Office of Rep. Doe".to_string()))
        );
        assert_eq!(
            set.field("final_report").unwrap().value,
            Some(FieldData::Checkbox(true))
        );
        assert_eq!(set.present_count(), set.fields.len());
    }

    #[test]
    fn test_unmarked_checkbox_is_absent() {
        let text = "TERMINATION REPORT\nFinal report attached";
        let template = TemplateRegistry::global()
            .get(TemplateType::TerminationNotice)
            .unwrap();
        let set = FormExtractor::new(TemplateType::TerminationNotice).extract(text, template);
        assert!(!set.field("final_report").unwrap().is_present());
    }
}

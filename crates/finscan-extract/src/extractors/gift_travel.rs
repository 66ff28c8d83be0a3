use finscan::models::TemplateType;

use super::common::{capture_fields, extract_rows};
use super::{FieldExtractor, FieldSet};
use crate::templates::TemplateSpec;

/// Gift and travel reports. Each row is one gift or one trip, labelled by
/// the row rule that matched it.
pub struct GiftTravelExtractor;

impl FieldExtractor for GiftTravelExtractor {
    fn template_type(&self) -> TemplateType {
        TemplateType::GiftTravelReport
    }

    fn extract(&self, text: &str, template: &TemplateSpec) -> FieldSet {
        let fields = capture_fields(text, &template.rules);
        let region = template
            .rows
            .as_ref()
            .map(|spec| extract_rows(text, spec))
            .unwrap_or_default();
        FieldSet {
            fields,
            rows: region.rows,
            row_region_found: region.found,
            unparsed_rows: region.unparsed,
        }
    }
}

//! Field extractors, one strategy per template family.
//!
//! Every strategy is reached through [`FieldExtractor::extract`]. Adding a
//! template means adding a catalog entry and registering a strategy here;
//! the engine only ever sees the trait.

mod checkbox;
mod common;
mod disclosure;
mod form;
mod gift_travel;
mod transaction;
pub mod values;

use std::collections::HashMap;
use std::sync::Arc;

use finscan::models::{FieldValue, TemplateType, TransactionRecord};

use crate::templates::TemplateSpec;

pub use checkbox::mark_state;
pub use common::{capture_field, cell_coverage, extract_rows, locate_region, RowRegion};
pub use disclosure::DisclosureExtractor;
pub use form::FormExtractor;
pub use gift_travel::GiftTravelExtractor;
pub use transaction::TransactionReportExtractor;

/// Output of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    /// One entry per template rule, in rule order. Unmatched fields are
    /// explicit absences.
    pub fields: Vec<FieldValue>,
    pub rows: Vec<TransactionRecord>,
    /// Whether the repeated-row region was located, even if it held no rows.
    pub row_region_found: bool,
    /// Region lines that looked like rows but fit no row rule.
    pub unparsed_rows: usize,
}

impl FieldSet {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn present_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_present()).count()
    }
}

/// A template-specific extraction strategy.
pub trait FieldExtractor: Send + Sync {
    fn template_type(&self) -> TemplateType;

    /// Apply the template's rules to normalized text.
    fn extract(&self, text: &str, template: &TemplateSpec) -> FieldSet;
}

/// Extractor lookup by template type.
pub struct ExtractorRegistry {
    extractors: HashMap<TemplateType, Arc<dyn FieldExtractor>>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with a strategy for every built-in template.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TransactionReportExtractor));
        registry.register(Arc::new(DisclosureExtractor::new(
            TemplateType::AnnualDisclosure,
        )));
        registry.register(Arc::new(DisclosureExtractor::new(
            TemplateType::CandidateDisclosure,
        )));
        registry.register(Arc::new(FormExtractor::new(TemplateType::ExtensionRequest)));
        registry.register(Arc::new(FormExtractor::new(TemplateType::TerminationNotice)));
        registry.register(Arc::new(GiftTravelExtractor));
        registry
    }

    /// Register (or replace) the strategy for its template type.
    pub fn register(&mut self, extractor: Arc<dyn FieldExtractor>) {
        self.extractors.insert(extractor.template_type(), extractor);
    }

    pub fn get(&self, template_type: TemplateType) -> Option<Arc<dyn FieldExtractor>> {
        self.extractors.get(&template_type).cloned()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_has_an_extractor() {
        let registry = ExtractorRegistry::with_defaults();
        for template_type in TemplateType::ALL {
            let extractor = registry.get(template_type).unwrap();
            assert_eq!(extractor.template_type(), template_type);
        }
        assert!(registry.get(TemplateType::Unknown).is_none());
    }
}

//! Document classifier: page-level text availability and template type.

use finscan::config::ClassifierConfig;
use finscan::models::{
    ClassificationResult, DocumentHandle, PageVerdict, TemplateSource, TemplateType,
    TextAvailability,
};

use crate::templates::TemplateRegistry;

pub struct Classifier<'a> {
    config: ClassifierConfig,
    registry: &'a TemplateRegistry,
}

impl<'a> Classifier<'a> {
    pub fn new(config: ClassifierConfig, registry: &'a TemplateRegistry) -> Self {
        Self { config, registry }
    }

    /// Classify a document from its per-page native text.
    ///
    /// Pages with fewer than `min_native_chars` non-whitespace characters are
    /// image-only. The document is native (or image) when at least
    /// `majority_ratio` of its pages agree, mixed otherwise. A caller hint
    /// fixes the template; otherwise markers in the native text decide it,
    /// and documents with no usable native text defer detection until after
    /// acquisition.
    pub fn classify(&self, handle: &DocumentHandle, native_text: &[String]) -> ClassificationResult {
        let pages: Vec<PageVerdict> = native_text
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let native_chars = text.chars().filter(|c| !c.is_whitespace()).count();
                PageVerdict {
                    page: index as u32 + 1,
                    native_chars,
                    availability: if native_chars >= self.config.min_native_chars {
                        TextAvailability::Native
                    } else {
                        TextAvailability::Image
                    },
                }
            })
            .collect();

        if pages.is_empty() {
            return ClassificationResult::unsupported(handle.template_hint);
        }

        let total = pages.len() as f64;
        let native = pages
            .iter()
            .filter(|p| p.availability == TextAvailability::Native)
            .count() as f64;
        let native_share = native / total;
        let image_share = 1.0 - native_share;

        let verdict = if native_share >= self.config.majority_ratio {
            TextAvailability::Native
        } else if image_share >= self.config.majority_ratio {
            TextAvailability::Image
        } else {
            TextAvailability::Mixed
        };
        let confidence = native_share.max(image_share);

        let (template_type, template_source) = match handle.template_hint {
            Some(hint) => (hint, TemplateSource::Hint),
            None if verdict == TextAvailability::Image => {
                (TemplateType::Unknown, TemplateSource::Deferred)
            }
            None => self.detect_template(native_text),
        };

        tracing::debug!(
            "Document {} classified {} ({} of {} pages native), template {}",
            handle.id,
            verdict.as_str(),
            native,
            total,
            template_type
        );

        ClassificationResult {
            pages,
            verdict,
            template_type,
            template_source,
            confidence,
        }
    }

    fn detect_template(&self, native_text: &[String]) -> (TemplateType, TemplateSource) {
        let joined = native_text.join("\n");
        match self.registry.detect(&joined) {
            Some((template_type, _)) => (template_type, TemplateSource::Markers),
            None => (TemplateType::Unknown, TemplateSource::Undetected),
        }
    }
}

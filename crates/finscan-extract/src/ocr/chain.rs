//! The cloud tier as one backend: configured services tried in order.

use std::path::Path;
use std::sync::Arc;

use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
use super::gemini::GeminiBackend;
use super::groq::GroqBackend;

/// Ordered cloud services. A page goes to the first service that answers;
/// a rate-limited or failing service hands the page to the next one.
pub struct CloudChain {
    services: Vec<Arc<dyn OcrBackend>>,
}

impl CloudChain {
    /// Build from `cloud.backends` names. Unknown names, local engines and
    /// services without credentials are left out.
    pub fn from_names<S: AsRef<str>>(names: &[S], config: &OcrConfig) -> Self {
        let mut services = Vec::new();
        for name in names.iter().map(AsRef::as_ref) {
            let Some(service) = Self::service(name, config) else {
                tracing::warn!("Ignoring cloud backend '{}': not a cloud service", name);
                continue;
            };
            if service.is_available() {
                services.push(service);
            } else {
                tracing::debug!(
                    "Cloud backend {} skipped: {}",
                    name,
                    service.availability_hint()
                );
            }
        }
        tracing::debug!("Cloud chain: {} service(s) ready", services.len());
        Self { services }
    }

    pub fn from_backends(services: Vec<Arc<dyn OcrBackend>>) -> Self {
        Self { services }
    }

    fn service(name: &str, config: &OcrConfig) -> Option<Arc<dyn OcrBackend>> {
        match OcrBackendType::from_str(name)? {
            OcrBackendType::Gemini => Some(Arc::new(GeminiBackend::with_config(config.clone()))),
            OcrBackendType::Groq => Some(Arc::new(GroqBackend::with_config(config.clone()))),
            OcrBackendType::Tesseract => None,
        }
    }

    /// Whether the named service has credentials.
    pub fn service_available(name: &str) -> bool {
        Self::service(name, &OcrConfig::default()).is_some_and(|s| s.is_available())
    }

    /// What the named service needs, or `None` for names that are not cloud services.
    pub fn service_hint(name: &str) -> Option<String> {
        Self::service(name, &OcrConfig::default()).map(|s| s.availability_hint())
    }

    pub fn services(&self) -> Vec<OcrBackendType> {
        self.services.iter().map(|s| s.backend_type()).collect()
    }
}

impl OcrBackend for CloudChain {
    fn backend_type(&self) -> OcrBackendType {
        self.services
            .first()
            .map(|s| s.backend_type())
            .unwrap_or(OcrBackendType::Gemini)
    }

    fn is_available(&self) -> bool {
        !self.services.is_empty()
    }

    fn availability_hint(&self) -> String {
        if self.services.is_empty() {
            return "No cloud service configured with credentials".to_string();
        }
        let names: Vec<&str> = self.services.iter().map(|s| s.backend_type().as_str()).collect();
        format!("Cloud chain: {}", names.join(" -> "))
    }

    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let mut last_error = None;
        for service in &self.services {
            match service.ocr_image(image_path) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        "{} failed on {}, trying next service: {}",
                        service.backend_type(),
                        image_path.display(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| OcrError::BackendNotAvailable(self.availability_hint())))
    }
}

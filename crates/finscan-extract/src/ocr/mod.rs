//! OCR backends for the local and cloud recognition tiers.
//!
//! Backends are synchronous; the acquisition cascade runs them on the
//! blocking pool under a per-attempt timeout.

mod api_backend;
mod backend;
mod chain;
mod gemini;
mod groq;
mod model_utils;
mod tesseract;

pub use backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
pub use chain::CloudChain;
pub use gemini::GeminiBackend;
pub use groq::GroqBackend;
pub use model_utils::{check_binary, check_pdftoppm_hint};
pub use tesseract::TesseractBackend;

use std::sync::Arc;

use finscan::config::EngineConfig;

/// Local recognition backend for the configured language.
pub fn local_backend(config: &EngineConfig) -> Arc<dyn OcrBackend> {
    Arc::new(TesseractBackend::with_config(OcrConfig::from_engine(config)))
}

/// Cloud recognition chain built from `cloud.backends`.
pub fn cloud_backend(config: &EngineConfig) -> Arc<dyn OcrBackend> {
    Arc::new(CloudChain::from_names(
        config.cloud.backends.as_slice(),
        &OcrConfig::from_engine(config),
    ))
}

//! Recognition backend contract for the local and cloud tiers.

use std::path::Path;
use std::time::Duration;

use finscan::config::EngineConfig;
use thiserror::Error;

/// Why a recognition attempt produced no text.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Rate limited by {backend}, retry after {retry_after_secs:?}s")]
    RateLimited {
        backend: OcrBackendType,
        retry_after_secs: Option<u64>,
    },

    #[error("{backend} timed out after {timeout:?}")]
    Timeout {
        backend: OcrBackendType,
        timeout: Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    /// Whether another attempt at the same tier may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OcrError::OcrFailed(_)
                | OcrError::RateLimited { .. }
                | OcrError::Timeout { .. }
                | OcrError::Io(_)
        )
    }
}

/// Text recognized from one page image.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    /// Engine-reported confidence in [0, 1]; the cascade scores yield itself
    /// and only logs this.
    pub confidence: Option<f32>,
    pub backend: OcrBackendType,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrBackendType {
    /// Local tier.
    Tesseract,
    Gemini,
    Groq,
}

impl OcrBackendType {
    pub const ALL: [OcrBackendType; 3] = [
        OcrBackendType::Tesseract,
        OcrBackendType::Gemini,
        OcrBackendType::Groq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendType::Tesseract => "tesseract",
            OcrBackendType::Gemini => "gemini",
            OcrBackendType::Groq => "groq",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Some(OcrBackendType::Tesseract),
            "gemini" => Some(OcrBackendType::Gemini),
            "groq" => Some(OcrBackendType::Groq),
            _ => None,
        }
    }

    /// Paid services that draw on the cloud budget.
    pub fn is_cloud(&self) -> bool {
        !matches!(self, OcrBackendType::Tesseract)
    }
}

impl std::fmt::Display for OcrBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recognition engine. Calls block; the cascade moves them onto the
/// blocking pool.
pub trait OcrBackend: Send + Sync {
    fn backend_type(&self) -> OcrBackendType;

    /// Binary on PATH or credentials present.
    fn is_available(&self) -> bool;

    /// Operator-facing note on what is missing (or what is configured).
    fn availability_hint(&self) -> String;

    /// Recognize a single rasterized page.
    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError>;
}

/// Backend settings derived from [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract language code, e.g. "eng".
    pub language: String,
    pub model: Option<String>,
    pub request_timeout: Duration,
}

impl OcrConfig {
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            language: config.acquisition.language.clone(),
            model: config.cloud.model.clone(),
            request_timeout: Duration::from_secs(config.acquisition.attempt_timeout_secs),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            model: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}
